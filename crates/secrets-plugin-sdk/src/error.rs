//! Error taxonomy for the plugin-side SDK mirror (component C11).

use secrets_wire::WireError;
use thiserror::Error;

/// Everything that can go wrong while a plugin brings itself into
/// service.
#[derive(Debug, Error)]
pub enum PluginError {
    /// `run()` was called while a previous call was still in flight.
    #[error("plugin is already running")]
    AlreadyRunning,
    /// The host-supplied environment variable was absent, malformed, or
    /// failed validation.
    #[error("invalid launch environment: {0}")]
    InvalidEnvironment(String),
    /// Dialing the host's socket (manual mode) failed.
    #[error("failed to dial host: {0}")]
    Dial(String),
    /// The host rejected this plugin's `RegisterPlugin` call.
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),
    /// The host never replied to `RegisterPlugin` within the budget.
    #[error("registration timed out")]
    RegistrationTimeout,
    /// The transport to the host closed.
    #[error("connection to host closed")]
    Closed,
}

/// Result alias for [`PluginError`].
pub type PluginResult<T> = Result<T, PluginError>;

impl From<WireError> for PluginError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Closed => PluginError::Closed,
            WireError::Timeout => PluginError::RegistrationTimeout,
            WireError::Provider(message) => PluginError::RegistrationRejected(message),
            other => PluginError::RegistrationRejected(other.to_string()),
        }
    }
}
