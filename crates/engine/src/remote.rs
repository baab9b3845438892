use isles_protocol::{Game, Island};
use std::future::Future;

/// Authoritative create/update/delete/list of game and island records.
///
/// Every resolved record is canonical: callers overwrite their working copy
/// with it. Failures are returned once; nothing here retries.
pub trait RemoteStore {
    /// Resolves with the draft plus its server-assigned `objectId`.
    fn create_game(&self, draft: &Game) -> impl Future<Output = anyhow::Result<Game>>;

    fn update_game(&self, id: &str, game: &Game) -> impl Future<Output = anyhow::Result<Game>>;

    /// Resolves only once the record is gone.
    fn delete_game(&self, id: &str) -> impl Future<Output = anyhow::Result<()>>;

    /// Games owned by the current session; empty without one.
    fn list_games(&self) -> impl Future<Output = anyhow::Result<Vec<Game>>>;

    fn create_island(&self, draft: &Island) -> impl Future<Output = anyhow::Result<Island>>;

    fn update_island(
        &self,
        id: &str,
        island: &Island,
    ) -> impl Future<Output = anyhow::Result<Island>>;

    fn delete_island(&self, id: &str) -> impl Future<Output = anyhow::Result<()>>;

    /// Islands belonging to `game_id`, in no particular order.
    fn list_islands(&self, game_id: &str) -> impl Future<Output = anyhow::Result<Vec<Island>>>;
}
