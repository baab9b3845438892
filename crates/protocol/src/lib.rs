use serde::{Deserialize, Serialize};

/// A saved game. `islands` mirrors the order of the game's island list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub islands: Vec<String>,
    /// Set while rendering the settings table; never persisted.
    #[serde(skip)]
    pub active: bool,
}

impl Game {
    pub fn draft(name: impl Into<String>) -> Self {
        Self {
            object_id: None,
            name: name.into(),
            islands: Vec::new(),
            active: false,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Island {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub name: String,
    pub game: String,
    pub url: String,
}

impl Island {
    pub fn draft(name: impl Into<String>, game_id: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            object_id: None,
            url: slug(&name),
            name,
            game: game_id.into(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    /// Renames the island and recomputes its url.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.url = slug(&self.name);
    }
}

/// Url slug for an island name: lowercase alphanumerics, every other run of
/// characters collapsed into one `-`, never leading or trailing.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut gap = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if gap && !out.is_empty() {
                out.push('-');
            }
            gap = false;
            out.extend(c.to_lowercase());
        } else {
            gap = true;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub session_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.session_token.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Carries the session token on record requests.
pub const SESSION_HEADER: &str = "x-session-token";

pub mod routes {
    pub const GAMES: &str = "/classes/Game";
    pub const ISLANDS: &str = "/classes/Island";

    pub const SETTINGS_SCREEN: &str = "/settings";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl Patch {
    pub fn replace(target: &str, payload: serde_json::Value) -> Self {
        Self {
            target: target.to_string(),
            payload: Some(payload),
            trigger: None,
        }
    }

    pub fn with_trigger(mut self, trigger: &str) -> Self {
        self.trigger = Some(trigger.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiUpdate {
    pub event: String,
    pub patches: Vec<Patch>,
}

impl UiUpdate {
    pub fn new(event: impl Into<String>, patches: Vec<Patch>) -> Self {
        Self {
            event: event.into(),
            patches,
        }
    }

    pub fn patch(&self, target: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.target == target)
    }
}

pub mod targets {
    pub const ISLANDS_TABLE: &str = "islands.table";
    pub const SETTINGS_SESSION: &str = "settings.session";
    pub const SETTINGS_GAMES: &str = "settings.games";
    pub const SETTINGS_FORM: &str = "settings.form";
}

pub mod triggers {
    pub const FORM_RESET: &str = "form.reset";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_collapses_separators() {
        assert_eq!(slug("Foo"), "foo");
        assert_eq!(slug("  New   Hope! "), "new-hope");
        assert_eq!(slug("Crown Falls / North"), "crown-falls-north");
        assert_eq!(slug("!!!"), "");
    }

    #[test]
    fn rename_recomputes_url() {
        let mut island = Island::draft("Old Town", "g1");
        assert_eq!(island.url, "old-town");
        island.rename("Big Britannia");
        assert_eq!(island.name, "Big Britannia");
        assert_eq!(island.url, "big-britannia");
    }

    #[test]
    fn records_use_object_id_and_skip_active() {
        let mut game = Game::draft("Save 1");
        game.object_id = Some("g1".to_string());
        game.islands = vec!["i1".to_string()];
        game.active = true;

        let v = serde_json::to_value(&game).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "objectId": "g1", "name": "Save 1", "islands": ["i1"] })
        );

        let back: Game = serde_json::from_value(v).unwrap();
        assert!(!back.active);

        let draft = serde_json::to_value(Island::draft("Foo", "g1")).unwrap();
        assert!(draft.get("objectId").is_none());
        assert_eq!(draft["url"], "foo");
    }

    #[test]
    fn patch_json_carries_only_set_fields() {
        let patch = Patch::replace(targets::SETTINGS_FORM, serde_json::json!({ "error": null }));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({ "target": "settings.form", "payload": { "error": null } })
        );
        let reset = patch.with_trigger(triggers::FORM_RESET);
        assert_eq!(
            serde_json::to_value(&reset).unwrap()["trigger"],
            "form.reset"
        );
    }

    #[test]
    fn session_token_follows_user() {
        assert_eq!(Session::anonymous().token(), None);
        let session = Session::signed_in(User {
            username: "ann".to_string(),
            session_token: "t1".to_string(),
        });
        assert_eq!(session.token(), Some("t1"));
    }
}
