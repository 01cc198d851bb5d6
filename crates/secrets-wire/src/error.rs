//! Transport/lifecycle error taxonomy for the multiplexer and RPC layer.

use thiserror::Error;

/// Errors surfaced by the duplex multiplexer and the RPC layer built on
/// top of it (components C3/C4/C12).
#[derive(Debug, Error)]
pub enum WireError {
    /// The underlying transport (or one of its logical channels) is closed.
    #[error("transport closed")]
    Closed,
    /// The call did not complete within its deadline.
    #[error("operation timed out")]
    Timeout,
    /// The call was cancelled by its caller's cancellation token.
    #[error("operation cancelled")]
    Cancelled,
    /// The peer returned an application-level error for this call.
    #[error("peer error: {0}")]
    Provider(String),
    /// Framing or JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Low-level I/O failure on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A route name was registered twice, or no route matched an
    /// incoming request.
    #[error("no such method: {0}")]
    NoSuchMethod(String),
}

/// Result alias for [`WireError`].
pub type WireResult<T> = Result<T, WireError>;

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        WireError::Serialization(err.to_string())
    }
}
