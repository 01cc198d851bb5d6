//! `secrets-discovery` — enumerates plugin executables, launches them,
//! and registers the results (component C8).
//!
//! Depends on `secrets-host` for the runtime/registry types the
//! launched plugins end up in; knows nothing about request routing.

#![warn(missing_docs)]

pub mod error;
pub mod launcher;
pub mod spawn;

pub use error::{DiscoveryError, DiscoveryResult};
pub use launcher::{Launcher, discover};
pub use spawn::launch;

use std::path::Path;
use std::sync::Arc;

use secrets_host::{EngineConfig, HostError, PatternPolicy, PluginRuntime, Registry};

/// Discover every plugin executable under `plugin_dir` and launch each
/// one concurrently, registering the ones that complete their
/// handshake successfully.
///
/// Per spec.md §4.8, `start_all` fans launchers out concurrently and
/// returns once every launch attempt has finished; a single failing
/// plugin is logged and does not abort its peers.
pub async fn start_all(
    plugin_dir: impl AsRef<Path>,
    registry: &Arc<Registry>,
    config: &EngineConfig,
    engine_name: &str,
    engine_version: &str,
    pattern_policy: PatternPolicy,
) -> Result<Vec<Arc<PluginRuntime>>, DiscoveryError> {
    let launchers = discover(plugin_dir)?;
    let tasks = launchers.into_iter().map(|launcher| {
        let registry = Arc::clone(registry);
        let config = *config;
        let engine_name = engine_name.to_string();
        let engine_version = engine_version.to_string();
        let pattern_policy = Arc::clone(&pattern_policy);
        tokio::spawn(async move {
            match launch(&launcher, &registry, &config, &engine_name, &engine_version, pattern_policy).await {
                Ok(runtime) => Some(runtime),
                Err(err) => {
                    log_launch_failure(&launcher, &err);
                    None
                },
            }
        })
    });

    let mut started = Vec::new();
    for task in tasks {
        if let Ok(Some(runtime)) = task.await {
            started.push(runtime);
        }
    }
    Ok(started)
}

fn log_launch_failure(launcher: &Launcher, err: &HostError) {
    tracing::warn!(plugin = %launcher.display_name, error = %err, "failed to launch plugin");
}
