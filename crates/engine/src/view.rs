use isles_protocol::{targets, triggers, Game, Island, Patch, UiUpdate, User};
use serde_json::json;

pub const ISLANDS_EVENT: &str = "islands.render";
pub const SETTINGS_EVENT: &str = "settings.render";

/// The island table, one row per island in list order (1-based `order`).
pub fn islands_view(islands: &[Island]) -> UiUpdate {
    let rows: Vec<_> = islands
        .iter()
        .enumerate()
        .map(|(index, island)| {
            json!({
                "order": index + 1,
                "objectId": island.object_id,
                "name": island.name,
                "url": island.url,
            })
        })
        .collect();
    UiUpdate::new(
        ISLANDS_EVENT,
        vec![Patch::replace(targets::ISLANDS_TABLE, json!({ "rows": rows }))],
    )
}

pub fn settings_view(
    games: &[Game],
    user: Option<&User>,
    error: Option<&str>,
    reset_form: bool,
) -> UiUpdate {
    let session = match user {
        Some(user) => json!({ "signedIn": true, "username": user.username }),
        None => json!({ "signedIn": false }),
    };
    let rows: Vec<_> = games
        .iter()
        .enumerate()
        .map(|(index, game)| {
            json!({
                "index": index,
                "objectId": game.object_id,
                "name": game.name,
                "active": game.active,
            })
        })
        .collect();
    let mut form = Patch::replace(targets::SETTINGS_FORM, json!({ "error": error }));
    if reset_form {
        form = form.with_trigger(triggers::FORM_RESET);
    }
    UiUpdate::new(
        SETTINGS_EVENT,
        vec![
            Patch::replace(targets::SETTINGS_SESSION, session),
            Patch::replace(targets::SETTINGS_GAMES, json!({ "rows": rows })),
            form,
        ],
    )
}
