use thiserror::Error;

/// Failures surfaced by the supervisor core.
///
/// A report that does not arrive in time is not an error; see
/// [`ReportOutcome::TimedOut`](crate::ReportOutcome::TimedOut).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    /// The boot attempt cannot proceed. Never retried automatically.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The command could not be handed to the child process.
    #[error("failed to send command to server: {0}")]
    Transport(String),

    /// An argument of an unsupported shape reached the console encoder.
    #[error("cannot encode console argument: {0}")]
    Encoding(String),
}

impl SupervisorError {
    pub fn code(&self) -> &'static str {
        match self {
            SupervisorError::Precondition(_) => "PRECONDITION",
            SupervisorError::Transport(_) => "TRANSPORT",
            SupervisorError::Encoding(_) => "ENCODING",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SupervisorError::Transport(_))
    }
}
