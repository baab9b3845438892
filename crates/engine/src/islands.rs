use isles_protocol::{routes, Game, Island};

use crate::context::{snapshot_failed, Context};
use crate::error::{CommandError, Outcome};
use crate::presenter::Presenter;
use crate::remote::RemoteStore;
use crate::snapshot::SnapshotStore;
use crate::view::islands_view;

pub const NO_ACTIVE_GAME: &str = "No loaded game found!";
pub const ISLAND_NOT_FOUND: &str = "Island not found, please reload game!";
pub const NAME_MISSING: &str = "Please enter a name.";

/// The island screen in its loaded state.
///
/// Only reachable through [`IslandBoard::open`], which redirects to the
/// settings screen instead when no game is active. The working copies of the
/// game and its island list live here; every change that must survive a
/// reload is written to the snapshot store before the next render.
///
/// Invariant: `game.islands` is always the id sequence of `islands`.
pub struct IslandBoard<'a, S, R, P> {
    ctx: &'a mut Context<S, R, P>,
    game: Game,
    game_id: String,
    islands: Vec<Island>,
}

impl<'a, S, R, P> IslandBoard<'a, S, R, P>
where
    S: SnapshotStore,
    R: RemoteStore,
    P: Presenter,
{
    pub async fn open(ctx: &'a mut Context<S, R, P>) -> Result<Option<Self>, CommandError> {
        let active = ctx.snapshots.active_game().map_err(CommandError::Snapshot)?;
        let Some((game, game_id)) =
            active.and_then(|g| g.object_id.clone().map(|id| (g, id)))
        else {
            ctx.presenter.redirect(routes::SETTINGS_SCREEN);
            ctx.presenter.alert(NO_ACTIVE_GAME);
            return Ok(None);
        };
        let unsynced = ctx
            .snapshots
            .active_game_unsynced()
            .map_err(CommandError::Snapshot)?;
        let cached = ctx.snapshots.islands().map_err(CommandError::Snapshot)?;

        let mut board = Self {
            ctx,
            game,
            game_id,
            islands: Vec::new(),
        };
        match cached {
            Some(list) if mirrors(&list, &board.game_id, &board.game.islands) => {
                board.islands = list;
                if unsynced {
                    tracing::info!(game = %board.game_id, "resending unsynced game");
                    board.push_game("resend game").await?;
                }
            }
            _ => board.fetch(unsynced).await?,
        }
        board.render();
        Ok(Some(board))
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    pub fn render(&mut self) {
        let update = islands_view(&self.islands);
        self.ctx.presenter.render(update);
    }

    /// Loads the island list of the active game from the remote store. The
    /// game record is rewritten when its order differs or when `unsynced`.
    async fn fetch(&mut self, unsynced: bool) -> Result<(), CommandError> {
        tracing::debug!(game = %self.game_id, "loading islands");
        let result = self.ctx.remote.list_islands(&self.game_id).await;
        let fetched = result.map_err(|err| self.ctx.remote_failed("list islands", err))?;

        let islands = order_by_ids(fetched, &self.game.islands);
        let ids = island_ids(&islands);
        if ids != self.game.islands || unsynced {
            tracing::info!(game = %self.game_id, "repairing island order of game");
            let mut game = self.game.clone();
            game.islands = ids;
            let result = self.ctx.remote.update_game(&self.game_id, &game).await;
            let canonical = result.map_err(|err| self.ctx.remote_failed("update game", err))?;
            self.islands = islands;
            self.adopt_game(canonical);
        } else {
            self.islands = islands;
        }
        self.persist(false)
    }

    /// Creates an island at the end of the list.
    ///
    /// The island is shown and cached as soon as the server assigns its id.
    /// The game record is updated afterwards; if that second call fails the
    /// error is surfaced but the island stays.
    pub async fn create_island(&mut self, name: &str) -> Result<Outcome, CommandError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.ctx.reject(NAME_MISSING));
        }

        let draft = Island::draft(name, self.game_id.as_str());
        let result = self.ctx.remote.create_island(&draft).await;
        let island = result.map_err(|err| self.ctx.remote_failed("create island", err))?;
        if island.object_id.is_none() {
            let err = anyhow::anyhow!(
                "created island has no objectId; it may remain on the server until the game is reloaded"
            );
            return Err(self.ctx.remote_failed("create island", err));
        }

        tracing::info!(game = %self.game_id, island = ?island.object_id, "island created");
        self.islands.push(island);
        self.game.islands = island_ids(&self.islands);
        self.persist(true)?;
        self.render();

        self.push_game("create island").await?;
        Ok(Outcome::Applied)
    }

    pub async fn delete_island(&mut self, id: &str) -> Result<Outcome, CommandError> {
        let Some(index) = self.position(id) else {
            return Err(self.ctx.reject(ISLAND_NOT_FOUND));
        };
        let question = format!("Are you sure you want to delete {}?", self.islands[index].name);
        if !self.ctx.presenter.confirm(&question) {
            return Ok(Outcome::Cancelled);
        }

        let result = self.ctx.remote.delete_island(id).await;
        result.map_err(|err| self.ctx.remote_failed("delete island", err))?;

        tracing::info!(game = %self.game_id, island = id, "island deleted");
        self.islands.remove(index);
        self.game.islands = island_ids(&self.islands);
        self.persist(true)?;
        self.render();

        self.push_game("delete island").await?;
        Ok(Outcome::Applied)
    }

    /// Prompts for a new name; an empty or dismissed prompt changes nothing.
    pub async fn rename_island(&mut self, id: &str) -> Result<Outcome, CommandError> {
        let Some(index) = self.position(id) else {
            return Err(self.ctx.reject(ISLAND_NOT_FOUND));
        };
        let current = self.islands[index].name.clone();
        let answer = self
            .ctx
            .presenter
            .prompt(&format!("Enter new name for {current}"), &current);
        let Some(name) = answer.filter(|n| !n.trim().is_empty()) else {
            return Ok(Outcome::Cancelled);
        };

        let mut renamed = self.islands[index].clone();
        renamed.rename(name.trim());
        let result = self.ctx.remote.update_island(id, &renamed).await;
        let canonical = result.map_err(|err| self.ctx.remote_failed("rename island", err))?;

        tracing::info!(island = id, name = %canonical.name, "island renamed");
        self.islands[index] = canonical;
        self.ctx
            .snapshots
            .set_islands(Some(self.islands.as_slice()))
            .map_err(snapshot_failed)?;
        self.render();
        Ok(Outcome::Applied)
    }

    /// Moves an island to the 1-based position `order`, prompting for it when
    /// absent. Out-of-range positions are clamped to the ends of the list.
    /// Nothing moves locally until the game record accepts the new order.
    pub async fn reorder_island(
        &mut self,
        id: &str,
        order: Option<i64>,
    ) -> Result<Outcome, CommandError> {
        let Some(old_index) = self.position(id) else {
            return Err(self.ctx.reject(ISLAND_NOT_FOUND));
        };
        let order = match order {
            Some(order) => order,
            None => {
                let default = (old_index + 1).to_string();
                let answer = self.ctx.presenter.prompt("Enter new order", &default);
                match answer.as_deref().and_then(parse_order) {
                    Some(order) => order,
                    None => return Ok(Outcome::Cancelled),
                }
            }
        };
        let new_index = clamp_index(order, self.islands.len());

        let mut reordered = self.islands.clone();
        let island = reordered.remove(old_index);
        reordered.insert(new_index, island);
        let mut game = self.game.clone();
        game.islands = island_ids(&reordered);

        let result = self.ctx.remote.update_game(&self.game_id, &game).await;
        let canonical = result.map_err(|err| self.ctx.remote_failed("reorder islands", err))?;

        tracing::info!(island = id, from = old_index, to = new_index, "island moved");
        self.islands = reordered;
        self.adopt_game(canonical);
        self.persist(false)?;
        self.render();
        Ok(Outcome::Applied)
    }

    pub async fn move_up(&mut self, id: &str) -> Result<Outcome, CommandError> {
        match self.position(id) {
            Some(index) => self.reorder_island(id, Some(index as i64)).await,
            None => Err(self.ctx.reject(ISLAND_NOT_FOUND)),
        }
    }

    pub async fn move_down(&mut self, id: &str) -> Result<Outcome, CommandError> {
        match self.position(id) {
            Some(index) => self.reorder_island(id, Some(index as i64 + 2)).await,
            None => Err(self.ctx.reject(ISLAND_NOT_FOUND)),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.islands.iter().position(|i| i.id() == Some(id))
    }

    /// Second phase of create/delete: bring the game record in line with the
    /// island list already applied locally. On failure the snapshot keeps its
    /// unsynced mark and the next [`IslandBoard::open`] sends the game again.
    async fn push_game(&mut self, action: &str) -> Result<(), CommandError> {
        let result = self.ctx.remote.update_game(&self.game_id, &self.game).await;
        let canonical = result.map_err(|err| self.ctx.remote_failed(action, err))?;
        self.adopt_game(canonical);
        self.ctx
            .snapshots
            .set_active_game(Some(&self.game))
            .map_err(snapshot_failed)?;
        self.render();
        Ok(())
    }

    /// Takes the server's game record, keeping the island order mirrored from
    /// the local list.
    fn adopt_game(&mut self, canonical: Game) {
        let ids = island_ids(&self.islands);
        if canonical.islands != ids {
            tracing::warn!(game = %self.game_id, "server returned a different island order");
        }
        self.game = Game {
            object_id: canonical.object_id.or_else(|| Some(self.game_id.clone())),
            islands: ids,
            active: self.game.active,
            ..canonical
        };
    }

    /// Writes both namespaces. `unsynced` marks a game the remote store has
    /// not seen yet.
    fn persist(&mut self, unsynced: bool) -> Result<(), CommandError> {
        self.ctx
            .snapshots
            .set_islands(Some(self.islands.as_slice()))
            .map_err(snapshot_failed)?;
        let written = if unsynced {
            self.ctx.snapshots.set_active_game_unsynced(&self.game)
        } else {
            self.ctx.snapshots.set_active_game(Some(&self.game))
        };
        written.map_err(snapshot_failed)
    }
}

pub fn island_ids(islands: &[Island]) -> Vec<String> {
    islands.iter().filter_map(|i| i.object_id.clone()).collect()
}

fn mirrors(islands: &[Island], game_id: &str, ids: &[String]) -> bool {
    islands.iter().all(|i| i.game == game_id && i.object_id.is_some())
        && island_ids(islands) == ids
}

/// Orders islands by `ids`; islands missing from `ids` keep their relative
/// order at the end.
pub fn order_by_ids(mut islands: Vec<Island>, ids: &[String]) -> Vec<Island> {
    let mut ordered = Vec::with_capacity(islands.len());
    for id in ids {
        if let Some(pos) = islands.iter().position(|i| i.id() == Some(id.as_str())) {
            ordered.push(islands.remove(pos));
        }
    }
    ordered.extend(islands.into_iter().filter(|i| i.object_id.is_some()));
    ordered
}

/// Parses a typed position: integral numbers only, surrounding space allowed.
pub fn parse_order(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let value: f64 = input.parse().ok()?;
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    Some(value as i64)
}

/// 1-based position to a 0-based index inside `0..len`.
pub fn clamp_index(order: i64, len: usize) -> usize {
    let last = len.saturating_sub(1) as i64;
    order.saturating_sub(1).clamp(0, last) as usize
}
