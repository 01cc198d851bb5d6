//! Facade crate: wires the registry (C7), discovery (C8), and resolver
//! (C9/C10) crates together for an embedding binary.
//!
//! Deliberately carries no `main` and no CLI surface — spec.md §1 keeps
//! entry-point shells (daemons, CLIs, service supervisors) an external
//! collaborator; this crate is the library an embedder links against.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod settings;

pub use settings::EngineSettings;

use std::sync::Arc;

use secrets_discovery::DiscoveryError;
use secrets_host::{PatternPolicy, PluginRuntime, Registry, accept_all};
use secrets_resolver::{ResolverEngine, RestrictedResolver};

/// Assembles a [`Registry`] and a [`ResolverEngine`] over it, having
/// already launched and registered every plugin found under the
/// configured plugin directory.
pub struct SecretsEngine {
    registry: Arc<Registry>,
    resolver: Arc<ResolverEngine>,
}

impl SecretsEngine {
    /// Discover and launch every plugin under `settings.plugin_dir`,
    /// registering the ones that complete their handshake, then build a
    /// resolver over the result.
    ///
    /// A plugin that fails to launch or register is logged and
    /// skipped; `start` only fails if discovery itself cannot read the
    /// plugin directory (spec.md §4.8).
    pub async fn start(settings: EngineSettings) -> Result<Self, DiscoveryError> {
        let registry = Arc::new(Registry::new());
        let pattern_policy = settings.pattern_policy.clone().unwrap_or_else(accept_all);
        secrets_discovery::start_all(
            &settings.plugin_dir,
            &registry,
            &settings.config,
            &settings.engine_name,
            &settings.engine_version,
            pattern_policy,
        )
        .await?;
        let resolver = Arc::new(ResolverEngine::new(Arc::clone(&registry)));
        Ok(Self { registry, resolver })
    }

    /// The underlying registry, for embedders that need to enumerate or
    /// directly close individual plugins.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// A shared handle to the unrestricted resolver.
    #[must_use]
    pub fn resolver(&self) -> Arc<ResolverEngine> {
        Arc::clone(&self.resolver)
    }

    /// Wrap the shared resolver with a fresh, initially-empty allow-list,
    /// for projecting a subset of secrets into a sandboxed consumer
    /// (spec.md §4.10).
    #[must_use]
    pub fn restricted_resolver(&self) -> RestrictedResolver<Arc<ResolverEngine>> {
        RestrictedResolver::new(self.resolver())
    }

    /// Every plugin currently registered, name-ascending.
    #[must_use]
    pub fn plugins(&self) -> Vec<Arc<PluginRuntime>> {
        self.registry.get_all()
    }

    /// Close every registered plugin concurrently and wait for all of
    /// them to finish (spec.md §4.7: "parallel_stop").
    pub async fn shutdown(&self) {
        if let Err(err) = self.registry.parallel_stop().await {
            tracing::warn!(error = %err, "one or more plugins failed to close cleanly");
        }
    }
}

/// Install a default `tracing-subscriber` reading `RUST_LOG`
/// (`EnvFilter`), for embedders that want sensible logging out of the
/// box without configuring `tracing` themselves.
///
/// Does nothing beyond what the caller's own `tracing` setup already
/// does if a global subscriber is already installed; errors from a
/// second attempt are discarded rather than panicking an embedder.
#[cfg(feature = "default-logging")]
pub fn install_default_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_with_empty_plugin_dir_yields_idle_engine() {
        let dir = std::env::temp_dir().join(format!("secrets-engine-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let settings = EngineSettings::new(dir.clone());
        let engine = SecretsEngine::start(settings).await.unwrap();
        assert!(engine.plugins().is_empty());

        engine.shutdown().await;
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_plugin_dir_is_not_an_error() {
        let settings = EngineSettings::new("/nonexistent/path/for/secrets-engine-tests");
        let engine = SecretsEngine::start(settings).await.unwrap();
        assert!(engine.plugins().is_empty());
    }
}
