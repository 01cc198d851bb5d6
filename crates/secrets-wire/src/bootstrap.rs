//! The single environment-variable encoding a launched plugin reads to
//! find its inherited transport (spec.md §4.6/§6).
//!
//! Lives in `secrets-wire` rather than `secrets-host` or
//! `secrets-plugin-sdk` because both the launcher (`secrets-discovery`)
//! and the plugin-side SDK need the identical encode/decode logic and
//! neither should depend on the other.

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Name of the environment variable a launched plugin reads.
pub const ENV_VAR: &str = "SECRETS_PLUGIN_HANDSHAKE";

/// Maximum encoded length, per spec.md §6: "Must fit in 2048 bytes."
pub const MAX_ENCODED_LEN: usize = 2048;

/// The `{ name, registration_timeout, fd }` triple a launched plugin
/// decodes from its environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchEnv {
    /// The name the engine expects this plugin to register under.
    pub name: String,
    /// Registration budget, in milliseconds.
    pub registration_timeout_ms: u64,
    /// The inherited file descriptor number the plugin should dial.
    pub fd: i32,
}

impl LaunchEnv {
    /// Serialize to the compact string form stored in the environment.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Serialization`] if the encoded form would
    /// exceed [`MAX_ENCODED_LEN`] bytes.
    pub fn encode(&self) -> Result<String, WireError> {
        let encoded = serde_json::to_string(self)?;
        if encoded.len() > MAX_ENCODED_LEN {
            return Err(WireError::Serialization(format!(
                "launch environment string is {} bytes, exceeds the {MAX_ENCODED_LEN} byte limit",
                encoded.len()
            )));
        }
        Ok(encoded)
    }

    /// Parse and validate the environment variable's contents.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Serialization`] if the string is unparsable,
    /// `name` is empty, `registration_timeout_ms` is zero, or `fd` is
    /// below 3 (spec.md §6: "`fd` < 3 → error").
    pub fn decode(raw: &str) -> Result<Self, WireError> {
        let env: Self = serde_json::from_str(raw)?;
        if env.name.is_empty() {
            return Err(WireError::Serialization("launch environment name is empty".to_string()));
        }
        if env.registration_timeout_ms == 0 {
            return Err(WireError::Serialization("launch environment registration timeout is zero".to_string()));
        }
        if env.fd < 3 {
            return Err(WireError::Serialization(format!("launch environment fd {} is below 3", env.fd)));
        }
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let env = LaunchEnv {
            name: "vault".to_string(),
            registration_timeout_ms: 5000,
            fd: 3,
        };
        let encoded = env.encode().unwrap();
        assert!(encoded.len() <= MAX_ENCODED_LEN);
        assert_eq!(LaunchEnv::decode(&encoded).unwrap(), env);
    }

    #[test]
    fn rejects_empty_name() {
        let raw = serde_json::json!({"name": "", "registration_timeout_ms": 5000, "fd": 3}).to_string();
        assert!(LaunchEnv::decode(&raw).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let raw = serde_json::json!({"name": "vault", "registration_timeout_ms": 0, "fd": 3}).to_string();
        assert!(LaunchEnv::decode(&raw).is_err());
    }

    #[test]
    fn rejects_low_fd() {
        let raw = serde_json::json!({"name": "vault", "registration_timeout_ms": 5000, "fd": 2}).to_string();
        assert!(LaunchEnv::decode(&raw).is_err());
    }
}
