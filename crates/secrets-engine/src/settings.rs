//! Embedder-facing configuration for [`crate::SecretsEngine`].

use std::path::PathBuf;

use secrets_host::{EngineConfig, PatternPolicy};

/// Everything [`crate::SecretsEngine::start`] needs: where to look for
/// plugins, what identity to hand them at registration time, and the
/// timeout/pattern tunables to apply.
#[derive(Clone)]
pub struct EngineSettings {
    /// Directory scanned for plugin executables.
    pub plugin_dir: PathBuf,
    /// Name reported to plugins during the registration reply.
    pub engine_name: String,
    /// Version reported to plugins during the registration reply.
    pub engine_version: String,
    /// Registration/request/shutdown timeout budgets.
    pub config: EngineConfig,
    /// Validator applied to a plugin-declared pattern before it is
    /// accepted; `None` means accept every syntactically valid pattern.
    pub pattern_policy: Option<PatternPolicy>,
}

impl EngineSettings {
    /// Build settings for `plugin_dir`, defaulting the engine identity
    /// to this crate's own name/version and timeouts to
    /// [`EngineConfig::default`].
    #[must_use]
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            engine_name: env!("CARGO_PKG_NAME").to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            config: EngineConfig::default(),
            pattern_policy: None,
        }
    }

    /// Build settings from `SECRETS_PLUGIN_DIR` plus the timeout
    /// variables [`EngineConfig::from_env`] reads, for embedders that
    /// prefer environment-driven configuration over constructing
    /// [`EngineSettings`] by hand.
    #[must_use]
    pub fn from_env() -> Self {
        let plugin_dir = std::env::var("SECRETS_PLUGIN_DIR").unwrap_or_else(|_| "plugins".to_string());
        Self {
            config: EngineConfig::from_env(),
            ..Self::new(plugin_dir)
        }
    }

    /// Override the pattern validator applied at registration time.
    #[must_use]
    pub fn with_pattern_policy(mut self, policy: PatternPolicy) -> Self {
        self.pattern_policy = Some(policy);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_crate_identity() {
        let settings = EngineSettings::new("plugins");
        assert_eq!(settings.engine_name, "secrets-engine");
        assert!(settings.pattern_policy.is_none());
    }
}
