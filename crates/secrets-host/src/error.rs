//! The union error type the registry, runtime, and resolver operate
//! over, plus the small composite-error helper used by `parallel_stop`.

use std::fmt;

use secrets_wire::WireError;
use thiserror::Error;

/// Everything that can go wrong on the host side of a plugin runtime.
///
/// Mirrors spec.md §7's kind taxonomy for the parts owned by this
/// crate. `secrets-resolver` adds its own `NotFound`/`AccessDenied`
/// wrapping on top rather than growing this enum further.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// A second `RegisterPlugin` call arrived on an already-registered
    /// runtime.
    #[error("plugin already registered")]
    AlreadyRegistered,
    /// The registration validator refused the handshake; non-retriable.
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),
    /// No successful registration arrived within the configured budget.
    #[error("registration timed out")]
    RegistrationTimeout,
    /// The plugin subprocess exited abnormally.
    #[error("plugin {name} crashed: {cause}")]
    PluginCrashed {
        /// Registered plugin name, if known at the time of the crash.
        name: String,
        /// Human-readable cause (signal, exit code, or IO error).
        cause: String,
    },
    /// A plugin responded with an envelope for a different id than the
    /// one requested.
    #[error("plugin returned id {got:?}, expected {expected:?}")]
    IdMismatch {
        /// The id the caller asked for.
        expected: String,
        /// The id the plugin actually returned.
        got: String,
    },
    /// The plugin reported an application-level failure for this call.
    #[error("provider error: {0}")]
    Provider(String),
    /// The transport closed before (or instead of) a reply.
    #[error("connection closed")]
    Closed,
    /// The caller's cancellation token fired before a reply arrived.
    #[error("cancelled")]
    Cancelled,
    /// No reply arrived within the call's deadline.
    #[error("timed out")]
    Timeout,
    /// A composite of errors gathered from several independent
    /// operations (e.g. `parallel_stop`).
    #[error(transparent)]
    Joined(#[from] JoinedError),
}

/// Result alias for [`HostError`].
pub type HostResult<T> = Result<T, HostError>;

impl From<WireError> for HostError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Closed => HostError::Closed,
            WireError::Cancelled => HostError::Cancelled,
            WireError::Timeout => HostError::Timeout,
            WireError::Provider(message) => HostError::Provider(message),
            other => HostError::Provider(other.to_string()),
        }
    }
}

/// An aggregation of several [`HostError`]s, preserving each cause.
///
/// Grounded in the `warn!`-and-continue loops the teacher uses when
/// fanning a shutdown out across several independent subsystems: rather
/// than reporting only the first failure, every cause is kept and
/// joined for display.
#[derive(Debug, Clone, Default)]
pub struct JoinedError {
    causes: Vec<HostError>,
}

impl JoinedError {
    /// Build a joined error from a non-empty list of causes. Returns
    /// `None` if `causes` is empty (nothing to join).
    #[must_use]
    pub fn new(causes: Vec<HostError>) -> Option<Self> {
        if causes.is_empty() {
            None
        } else {
            Some(Self { causes })
        }
    }

    /// The individual causes that make up this aggregate.
    #[must_use]
    pub fn causes(&self) -> &[HostError] {
        &self.causes
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .causes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{joined}")
    }
}

impl std::error::Error for JoinedError {}
