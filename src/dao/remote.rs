use std::error::Error;
use thiserror::Error;

/// Result alias for calls to the Ledger and the game provider.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Error raised by remote backends regardless of the transport underneath.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote could not be reached.
    #[error("remote unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The request did not complete in time.
    #[error("remote timed out: {message}")]
    Timeout { message: String },
    /// The remote answered with a non-success status.
    #[error("remote rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    /// The remote answered with a body that could not be decoded.
    #[error("malformed remote response: {message}")]
    Malformed {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl RemoteError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        RemoteError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Construct a rejection error from a status code.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Whether retrying the same request later may succeed.
    ///
    /// A malformed success body counts as transient: the request may have been
    /// applied, and the idempotency key makes the retry safe.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RemoteError::Rejected { .. })
    }
}
