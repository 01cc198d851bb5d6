//! Engine-wide tunables (spec.md §9: "the registration-timeout default
//! and the request-timeout default are process-wide tunables with
//! explicit setters guarded by a reader/writer lock").
//!
//! `EngineConfig` is the constructor-injected alternative the same
//! note permits; callers that want to avoid any global state should
//! build one and thread it through explicitly instead of touching the
//! process-wide defaults below.

use std::env;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

const DEFAULT_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SHUTDOWN_BUDGET: Duration = Duration::from_secs(2);

fn registration_timeout_cell() -> &'static RwLock<Duration> {
    static CELL: OnceLock<RwLock<Duration>> = OnceLock::new();
    CELL.get_or_init(|| RwLock::new(DEFAULT_REGISTRATION_TIMEOUT))
}

fn request_timeout_cell() -> &'static RwLock<Duration> {
    static CELL: OnceLock<RwLock<Duration>> = OnceLock::new();
    CELL.get_or_init(|| RwLock::new(DEFAULT_REQUEST_TIMEOUT))
}

/// Read the process-wide default registration timeout.
#[must_use]
pub fn default_registration_timeout() -> Duration {
    *registration_timeout_cell().read().unwrap()
}

/// Override the process-wide default registration timeout.
pub fn set_default_registration_timeout(timeout: Duration) {
    *registration_timeout_cell().write().unwrap() = timeout;
}

/// Read the process-wide default per-request timeout.
#[must_use]
pub fn default_request_timeout() -> Duration {
    *request_timeout_cell().read().unwrap()
}

/// Override the process-wide default per-request timeout.
pub fn set_default_request_timeout(timeout: Duration) {
    *request_timeout_cell().write().unwrap() = timeout;
}

/// Constructor-injected alternative to the process-wide tunables above.
///
/// Prefer threading an `EngineConfig` through explicitly; the free
/// functions in this module exist for drop-in use by embedders that
/// don't need per-instance configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Budget for a plugin to complete its registration handshake.
    pub registration_timeout: Duration,
    /// Budget for a single `GetSecret` round trip.
    pub request_timeout: Duration,
    /// Budget for a runtime's `close()` to finish (IPC + subprocess wait).
    pub shutdown_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registration_timeout: DEFAULT_REGISTRATION_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_budget: DEFAULT_SHUTDOWN_BUDGET,
        }
    }
}

impl EngineConfig {
    /// Build a config from `SECRETS_REGISTRATION_TIMEOUT_MS` /
    /// `SECRETS_REQUEST_TIMEOUT_MS`, falling back to the defaults above
    /// for any variable that is absent or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_millis("SECRETS_REGISTRATION_TIMEOUT_MS") {
            config.registration_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_millis("SECRETS_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(ms);
        }
        config
    }
}

fn env_millis(var: &str) -> Option<u64> {
    env::var(var).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EngineConfig::default();
        assert_eq!(config.registration_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_budget, Duration::from_secs(2));
    }

    #[test]
    fn process_wide_setter_round_trips() {
        let original = default_registration_timeout();
        set_default_registration_timeout(Duration::from_secs(42));
        assert_eq!(default_registration_timeout(), Duration::from_secs(42));
        set_default_registration_timeout(original);
    }
}
