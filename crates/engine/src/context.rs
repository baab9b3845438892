use isles_protocol::Session;

use crate::error::CommandError;
use crate::presenter::Presenter;

/// Everything a screen needs, handed in explicitly at startup.
pub struct Context<S, R, P> {
    pub snapshots: S,
    pub remote: R,
    pub presenter: P,
    pub session: Session,
}

impl<S, R, P: Presenter> Context<S, R, P> {
    pub fn new(snapshots: S, remote: R, presenter: P, session: Session) -> Self {
        Self {
            snapshots,
            remote,
            presenter,
            session,
        }
    }

    /// Logs and alerts a rejected remote call. Local state is left untouched.
    pub(crate) fn remote_failed(&mut self, action: &str, err: anyhow::Error) -> CommandError {
        tracing::warn!(action, error = %format!("{err:#}"), "remote call rejected");
        let err = CommandError::Remote(err);
        self.presenter.alert(&err.to_string());
        err
    }

    pub(crate) fn reject(&mut self, message: &str) -> CommandError {
        tracing::debug!(message, "command rejected");
        self.presenter.alert(message);
        CommandError::validation(message)
    }
}

pub(crate) fn snapshot_failed(err: anyhow::Error) -> CommandError {
    tracing::warn!(error = %format!("{err:#}"), "snapshot write failed");
    CommandError::Snapshot(err)
}
