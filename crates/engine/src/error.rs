use suggest_lifecycle::{IsCancellation, RequestError};
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures reported by a [`SuggestionClient`](crate::SuggestionClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The call noticed its cancellation token and gave up
    #[error("Request aborted")]
    Aborted,

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl IsCancellation for TransportError {
    fn is_cancellation(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Superseded, explicitly cancelled or aborted. Never shown to the user.
    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The selection was empty once snapped to the buffer
    #[error("Selection [{start}, {end}) is empty")]
    EmptySelection { start: usize, end: usize },
}

impl EngineError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<RequestError<TransportError>> for EngineError {
    fn from(err: RequestError<TransportError>) -> Self {
        match err {
            RequestError::Cancelled => Self::Cancelled,
            RequestError::Failed(err) => Self::Transport(err),
        }
    }
}
