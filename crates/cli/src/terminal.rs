use isles::engine::Presenter;
use isles::protocol::{targets, UiUpdate};
use serde_json::Value;
use std::io::{self, BufRead, Write};

/// Presenter for an interactive terminal.
///
/// Renders are idempotent, so only the latest one is kept and printed by
/// [`TerminalPresenter::flush`] once the command has finished.
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    last: Option<UiUpdate>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush(&mut self) {
        if let Some(update) = self.last.take() {
            print!("{}", format_update(&update));
        }
    }

    fn read_line(&self) -> Option<String> {
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl Presenter for TerminalPresenter {
    fn render(&mut self, update: UiUpdate) {
        self.last = Some(update);
    }

    fn redirect(&mut self, path: &str) {
        tracing::debug!(path, "redirect");
        if path == isles::protocol::routes::SETTINGS_SCREEN {
            eprintln!("Load a game first: isles game load <position>");
        }
    }

    fn alert(&mut self, message: &str) {
        eprintln!("! {message}");
    }

    fn confirm(&mut self, message: &str) -> bool {
        print!("{message} [y/N]: ");
        matches!(
            self.read_line().as_deref().map(str::to_lowercase).as_deref(),
            Some("y" | "yes")
        )
    }

    fn prompt(&mut self, message: &str, default: &str) -> Option<String> {
        print!("{message} [{default}]: ");
        let line = self.read_line()?;
        if line.is_empty() {
            Some(default.to_string())
        } else {
            Some(line)
        }
    }
}

fn rows(payload: Option<&Value>) -> &[Value] {
    payload
        .and_then(|p| p.get("rows"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn text<'a>(row: &'a Value, key: &str) -> &'a str {
    row.get(key).and_then(Value::as_str).unwrap_or("")
}

pub fn format_update(update: &UiUpdate) -> String {
    let mut out = String::new();
    for patch in &update.patches {
        let payload = patch.payload.as_ref();
        match patch.target.as_str() {
            targets::ISLANDS_TABLE => {
                let rows = rows(payload);
                if rows.is_empty() {
                    out.push_str("No islands yet.\n");
                }
                for row in rows {
                    out.push_str(&format!(
                        "{:>3}. {:<24} /{:<24} {}\n",
                        row.get("order").and_then(Value::as_u64).unwrap_or(0),
                        text(row, "name"),
                        text(row, "url"),
                        text(row, "objectId"),
                    ));
                }
            }
            targets::SETTINGS_SESSION => {
                let signed_in = payload
                    .and_then(|p| p.get("signedIn"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if signed_in {
                    let name = payload.map(|p| text(p, "username")).unwrap_or("");
                    out.push_str(&format!("Logged in as {name}.\n"));
                } else {
                    out.push_str("Sign in to enable cloud sync.\n");
                }
            }
            targets::SETTINGS_GAMES => {
                let rows = rows(payload);
                if rows.is_empty() {
                    out.push_str("No games recorded!\n");
                }
                for row in rows {
                    let position = row.get("index").and_then(Value::as_u64).unwrap_or(0) + 1;
                    let marker = if row.get("active").and_then(Value::as_bool) == Some(true) {
                        "*"
                    } else {
                        " "
                    };
                    out.push_str(&format!("{marker}{position:>2}. {}\n", text(row, "name")));
                }
            }
            targets::SETTINGS_FORM => {
                if let Some(error) = payload.and_then(|p| p.get("error")).and_then(Value::as_str) {
                    out.push_str(&format!("error: {error}\n"));
                }
            }
            other => tracing::debug!(target = other, "unhandled patch"),
        }
    }
    out
}
