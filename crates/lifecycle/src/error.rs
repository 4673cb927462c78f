use thiserror::Error;

/// Outcome of a scheduled request that did not produce a value.
#[derive(Error, Debug)]
pub enum RequestError<E> {
    /// Superseded, explicitly cancelled, or aborted underneath. Never shown
    /// to the end user.
    #[error("request cancelled")]
    Cancelled,

    /// The work itself failed.
    #[error("{0}")]
    Failed(E),
}

impl<E> RequestError<E> {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert the failure type, keeping cancellations as they are.
    pub fn map_failure<F>(self, f: impl FnOnce(E) -> F) -> RequestError<F> {
        match self {
            Self::Cancelled => RequestError::Cancelled,
            Self::Failed(err) => RequestError::Failed(f(err)),
        }
    }

    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Cancelled => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// Errors from the transport layer that may themselves be abort signals.
///
/// An error that reports `true` is re-wrapped as [`RequestError::Cancelled`]
/// instead of being surfaced as a failure.
pub trait IsCancellation {
    fn is_cancellation(&self) -> bool;
}

impl IsCancellation for std::convert::Infallible {
    fn is_cancellation(&self) -> bool {
        match *self {}
    }
}
