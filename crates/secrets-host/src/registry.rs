//! Plugin registry (component C7): a concurrent, name-unique,
//! priority-ordered collection of live runtimes.
//!
//! "Priority" here is exactly the registry's sort key: name ascending
//! (spec.md §4.9's tie-break rule — lexicographically smallest plugin
//! name wins among overlapping patterns).

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{HostError, JoinedError};
use crate::runtime::PluginRuntime;

/// A closure that removes exactly the runtime it was returned for.
/// Calling it more than once is a no-op.
pub type RemoveFn = Box<dyn FnOnce() + Send>;

/// The concurrent, name-unique set of live plugin runtimes.
#[derive(Default)]
pub struct Registry {
    runtimes: RwLock<BTreeMap<String, Arc<PluginRuntime>>>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `runtime`, failing if its name is empty or already
    /// present. On success, returns a closure that removes exactly this
    /// runtime (spec.md §4.7).
    pub fn register(self: &Arc<Self>, runtime: Arc<PluginRuntime>) -> Result<RemoveFn, HostError> {
        let name = runtime.data().name.clone();
        if name.is_empty() {
            return Err(HostError::RegistrationRejected("plugin name is empty".to_string()));
        }

        let mut guard = self.runtimes.write().unwrap();
        if guard.contains_key(&name) {
            return Err(HostError::AlreadyRegistered);
        }
        let watched = Arc::clone(&runtime);
        guard.insert(name.clone(), runtime);
        drop(guard);

        let registry = Arc::clone(self);
        let watch_name = name.clone();
        tokio::spawn(async move {
            if let Some(cause) = watched.crashed().await {
                tracing::warn!(plugin = %watch_name, error = %cause, "plugin crashed; removing from registry");
                registry.runtimes.write().unwrap().remove(&watch_name);
                let _ = watched.close().await;
            }
        });

        let registry = Arc::clone(self);
        Ok(Box::new(move || {
            registry.runtimes.write().unwrap().remove(&name);
        }))
    }

    /// A read-only snapshot, ordered by name ascending. Safe to iterate
    /// without holding the registry's lock: it's a clone of the `Arc`
    /// references, not a view into the map.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<PluginRuntime>> {
        self.runtimes.read().unwrap().values().cloned().collect()
    }

    /// Look up a single runtime by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<PluginRuntime>> {
        self.runtimes.read().unwrap().get(name).cloned()
    }

    /// How many runtimes are currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runtimes.read().unwrap().len()
    }

    /// Whether the registry currently holds no runtimes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runtimes.read().unwrap().is_empty()
    }

    /// Close every current runtime concurrently, aggregating failures.
    /// Wall time is dominated by the slowest individual `close()`, not
    /// by the number of runtimes, since every close runs as its own
    /// task rather than sequentially.
    pub async fn parallel_stop(&self) -> Result<(), HostError> {
        let runtimes = self.get_all();
        let tasks: Vec<_> = runtimes
            .into_iter()
            .map(|runtime| tokio::spawn(async move { runtime.close().await }))
            .collect();

        let mut causes = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Ok(())) => {},
                Ok(Err(err)) => causes.push(err),
                Err(join_err) => causes.push(HostError::Provider(format!("close task panicked: {join_err}"))),
            }
        }

        match JoinedError::new(causes) {
            Some(joined) => Err(HostError::Joined(joined)),
            None => Ok(()),
        }
    }
}
