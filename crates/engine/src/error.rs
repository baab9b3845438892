use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    /// Rejected before any remote call; already surfaced to the user.
    #[error("{0}")]
    Validation(String),
    #[error("remote request failed: {0:#}")]
    Remote(anyhow::Error),
    #[error("local snapshot failed: {0:#}")]
    Snapshot(anyhow::Error),
}

impl CommandError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// How a command that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The user declined a confirmation or dismissed a prompt.
    Cancelled,
}
