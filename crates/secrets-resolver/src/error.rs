//! Error taxonomy for the resolver and restricted-resolver stage.

use secrets_host::HostError;
use thiserror::Error;

/// Everything a [`crate::Resolver`] can fail with, layered on top of
/// [`HostError`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No registered plugin served the id (no match, or every matching
    /// plugin returned an error).
    #[error("{0}")]
    NotFound(String),
    /// The restricted resolver's allow-list rejected the id.
    #[error("access denied for {0}")]
    AccessDenied(String),
    /// A failure surfaced by a plugin runtime.
    #[error(transparent)]
    Host(#[from] HostError),
}
