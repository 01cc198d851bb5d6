//! Error taxonomy for enumerating and launching plugin executables.

use thiserror::Error;

/// Failures specific to discovering plugin executables on disk.
///
/// Launch-time failures (spawn, handshake, registration) surface as
/// [`secrets_host::HostError`] instead; this enum only covers the
/// directory-walk itself.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// An I/O error other than "directory not found", which is instead
    /// treated as a warning and an empty result (spec.md §4.8).
    #[error("discovery I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for [`DiscoveryError`].
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
