use isles_protocol::Game;

use crate::context::{snapshot_failed, Context};
use crate::error::{CommandError, Outcome};
use crate::presenter::Presenter;
use crate::remote::RemoteStore;
use crate::snapshot::SnapshotStore;
use crate::view::settings_view;

pub const NAME_REQUIRED: &str = "Name is required!";
pub const GAME_NOT_FOUND: &str = "Game not found!";

/// The saved-games screen: the session's games plus create/delete/load.
pub struct SettingsScreen<'a, S, R, P> {
    ctx: &'a mut Context<S, R, P>,
    games: Vec<Game>,
}

impl<'a, S, R, P> SettingsScreen<'a, S, R, P>
where
    S: SnapshotStore,
    R: RemoteStore,
    P: Presenter,
{
    /// Lists the signed-in user's games; anonymous sessions start empty.
    pub async fn open(ctx: &'a mut Context<S, R, P>) -> Result<Self, CommandError> {
        let games = if ctx.session.user.is_some() {
            let result = ctx.remote.list_games().await;
            result.map_err(|err| ctx.remote_failed("list games", err))?
        } else {
            Vec::new()
        };
        let mut screen = Self { ctx, games };
        screen.update(None, false)?;
        Ok(screen)
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    /// Failures (empty name or a rejected create) are shown inline on the form.
    pub async fn create_game(&mut self, name: &str) -> Result<Outcome, CommandError> {
        let name = name.trim();
        if name.is_empty() {
            self.update(Some(NAME_REQUIRED), false)?;
            return Err(CommandError::validation(NAME_REQUIRED));
        }

        let draft = Game::draft(name);
        match self.ctx.remote.create_game(&draft).await {
            Ok(game) => {
                tracing::info!(game = ?game.object_id, "game created");
                self.games.push(game);
                self.update(None, true)?;
                Ok(Outcome::Applied)
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "create game rejected");
                let err = CommandError::Remote(err);
                self.update(Some(&err.to_string()), false)?;
                Err(err)
            }
        }
    }

    /// Deletes without asking. Deleting the loaded game also drops the local
    /// snapshot so the island screen falls back to settings.
    pub async fn delete_game(&mut self, index: usize) -> Result<Outcome, CommandError> {
        let Some(id) = self.games.get(index).and_then(|g| g.object_id.clone()) else {
            return Err(self.ctx.reject(GAME_NOT_FOUND));
        };

        let result = self.ctx.remote.delete_game(&id).await;
        result.map_err(|err| self.ctx.remote_failed("delete game", err))?;

        tracing::info!(game = %id, "game deleted");
        self.games.remove(index);
        if self.active_id()?.as_deref() == Some(id.as_str()) {
            self.ctx
                .snapshots
                .set_islands(None)
                .map_err(snapshot_failed)?;
            self.ctx
                .snapshots
                .set_active_game(None)
                .map_err(snapshot_failed)?;
        }
        self.update(None, false)?;
        Ok(Outcome::Applied)
    }

    /// Makes the game the active one. Its islands are fetched later, when the
    /// island screen opens.
    pub fn load_game(&mut self, index: usize) -> Result<Outcome, CommandError> {
        let Some(game) = self.games.get(index).cloned() else {
            return Err(self.ctx.reject(GAME_NOT_FOUND));
        };

        if self.active_id()? != game.object_id {
            self.ctx
                .snapshots
                .set_islands(None)
                .map_err(snapshot_failed)?;
        }
        self.ctx
            .snapshots
            .set_active_game(Some(&game))
            .map_err(snapshot_failed)?;
        tracing::info!(game = ?game.object_id, "game loaded");
        self.update(None, false)?;
        Ok(Outcome::Applied)
    }

    fn active_id(&self) -> Result<Option<String>, CommandError> {
        let active = self
            .ctx
            .snapshots
            .active_game()
            .map_err(CommandError::Snapshot)?;
        Ok(active.and_then(|g| g.object_id))
    }

    fn update(&mut self, error: Option<&str>, reset_form: bool) -> Result<(), CommandError> {
        let active = self.active_id()?;
        for game in &mut self.games {
            game.active = active.is_some() && game.object_id == active;
        }
        let update = settings_view(
            &self.games,
            self.ctx.session.user.as_ref(),
            error,
            reset_form,
        );
        self.ctx.presenter.render(update);
        Ok(())
    }
}
