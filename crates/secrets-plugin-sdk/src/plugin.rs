//! The plugin-side state machine itself (component C11, steps 2–4):
//! install handlers, register once, then serve until cancelled.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use secrets_core::{Id, Pattern, parse_id};
use secrets_wire::{RpcClient, RpcServerBuilder};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{PluginError, PluginResult};
use crate::transport::Transport;

/// What a plugin's `GetSecret` handler returns for a successfully
/// resolved id. The SDK fills in `id` itself (it already has it from
/// the incoming request) and `resolved_at` if the handler leaves it
/// unset, mirroring the host's own envelope-construction rule.
#[derive(Debug, Clone, Serialize)]
pub struct SecretResponse {
    /// The raw secret bytes.
    pub value: Vec<u8>,
    /// Opaque version tag for the value.
    pub version: Option<String>,
    /// When the underlying value was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When this response was produced; defaults to now if unset.
    pub resolved_at: Option<DateTime<Utc>>,
    /// When the value expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SecretResponse {
    /// Build a response carrying only a value; all provenance fields
    /// default (`resolved_at` is stamped as `now` by the SDK).
    #[must_use]
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            version: None,
            created_at: None,
            resolved_at: None,
            expires_at: None,
        }
    }
}

type GetSecretHandler = Arc<dyn Fn(Id) -> BoxFuture<'static, Result<SecretResponse, String>> + Send + Sync>;
type ShutdownHandler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Builds a [`Plugin`] from its identity and handlers.
pub struct PluginBuilder {
    name: String,
    version: String,
    pattern: Pattern,
    get_secret: GetSecretHandler,
    shutdown: ShutdownHandler,
}

impl PluginBuilder {
    /// Start building a plugin. `get_secret` is mandatory: it is the
    /// only way the plugin can ever answer a request.
    pub fn new<F, Fut>(name: impl Into<String>, version: impl Into<String>, pattern: Pattern, get_secret: F) -> Self
    where
        F: Fn(Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SecretResponse, String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            version: version.into(),
            pattern,
            get_secret: Arc::new(move |id| Box::pin(get_secret(id))),
            shutdown: Arc::new(|| Box::pin(async {})),
        }
    }

    /// Install a hook invoked when the host calls `Shutdown`. Defaults
    /// to a no-op.
    #[must_use]
    pub fn on_shutdown<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.shutdown = Arc::new(move || Box::pin(handler()));
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Plugin {
        Plugin {
            name: self.name,
            version: self.version,
            pattern: self.pattern,
            get_secret: self.get_secret,
            shutdown: self.shutdown,
            running: AtomicBool::new(false),
        }
    }
}

/// The plugin-side counterpart the host trusts (spec.md §4.11).
pub struct Plugin {
    name: String,
    version: String,
    pattern: Pattern,
    get_secret: GetSecretHandler,
    shutdown: ShutdownHandler,
    running: AtomicBool,
}

impl Plugin {
    /// Start building a plugin with the given identity and `GetSecret`
    /// handler.
    pub fn builder<F, Fut>(
        name: impl Into<String>,
        version: impl Into<String>,
        pattern: Pattern,
        get_secret: F,
    ) -> PluginBuilder
    where
        F: Fn(Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SecretResponse, String>> + Send + 'static,
    {
        PluginBuilder::new(name, version, pattern, get_secret)
    }

    /// Connect over `transport`, register once, and serve until `cancel`
    /// fires or the host closes the connection.
    ///
    /// Re-entrant: a second concurrent call returns
    /// [`PluginError::AlreadyRunning`] without disturbing the call
    /// already in flight.
    pub async fn run(&self, transport: Transport, cancel: CancellationToken) -> PluginResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(PluginError::AlreadyRunning);
        }
        let result = self.run_inner(transport, cancel).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, transport: Transport, cancel: CancellationToken) -> PluginResult<()> {
        let (plugin_chan, runtime_chan, mux) = secrets_wire::mux::spawn(transport.stream);

        let get_secret = Arc::clone(&self.get_secret);
        let shutdown = Arc::clone(&self.shutdown);
        let server = RpcServerBuilder::new()
            .route("GetSecret", move |params: Value| {
                let get_secret = Arc::clone(&get_secret);
                Box::pin(async move { handle_get_secret(&get_secret, params).await })
            })
            .route("Shutdown", move |_params| {
                let shutdown = Arc::clone(&shutdown);
                Box::pin(async move {
                    shutdown().await;
                    Ok(Value::Null)
                })
            })
            .start(plugin_chan, None);

        let client = RpcClient::new(runtime_chan);
        let register_params = serde_json::json!({
            "name": transport.name,
            "version": self.version,
            "pattern": self.pattern.as_str(),
        });
        let registration = client.call("RegisterPlugin", register_params, transport.registration_timeout).await;

        if let Err(err) = registration {
            server.close();
            mux.shutdown();
            return Err(PluginError::from(err));
        }
        tracing::info!(plugin = %transport.name, "registered with host");

        tokio::select! {
            _ = cancel.cancelled() => {},
            _ = server.wait() => {},
        }
        server.close();
        mux.shutdown();
        Ok(())
    }

    /// This plugin's configured name (pre-registration; the effective
    /// registered name is whatever [`Transport::name`] supplied).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

async fn handle_get_secret(get_secret: &GetSecretHandler, params: Value) -> Result<Value, String> {
    let id_str = params.get("id").and_then(Value::as_str).ok_or_else(|| "missing id".to_string())?;
    let id = parse_id(id_str).map_err(|err| err.to_string())?;
    let response = get_secret(id.clone()).await?;
    Ok(serde_json::json!({
        "id": id.as_str(),
        "value": response.value,
        "version": response.version,
        "created_at": response.created_at,
        "resolved_at": response.resolved_at.unwrap_or_else(Utc::now),
        "expires_at": response.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrets_core::parse_pattern;
    use secrets_wire::mux;
    use std::time::Duration;
    use tokio::io::duplex;

    // `Transport` is Unix-socket specific (it is produced by
    // `transport::from_env`/`transport::dial`), so these tests exercise
    // the same registration/serve logic `run_inner` uses, but driven
    // directly over a `tokio::io::duplex` pair standing in for the
    // transport.

    #[tokio::test]
    async fn registers_and_serves_get_secret() {
        let (host_side, plugin_side) = duplex(8192);
        let cancel = CancellationToken::new();

        let plugin_task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let (plugin_chan, runtime_chan, mux) = mux::spawn(plugin_side);
                let get_secret: GetSecretHandler = Arc::new(|id| {
                    Box::pin(async move { Ok(SecretResponse::new(format!("value-for-{id}").into_bytes())) })
                });
                let server = RpcServerBuilder::new()
                    .route("GetSecret", move |params: Value| {
                        let get_secret = Arc::clone(&get_secret);
                        Box::pin(async move { handle_get_secret(&get_secret, params).await })
                    })
                    .start(plugin_chan, None);
                let client = RpcClient::new(runtime_chan);
                client
                    .call(
                        "RegisterPlugin",
                        serde_json::json!({"name": "vault", "version": "1.0", "pattern": "db/**"}),
                        Duration::from_secs(2),
                    )
                    .await
                    .unwrap();
                tokio::select! {
                    _ = cancel.cancelled() => {},
                    _ = server.wait() => {},
                }
                server.close();
                mux.shutdown();
            })
        };

        let (host_plugin_chan, host_runtime_chan, host_mux) = mux::spawn(host_side);
        let host_client = RpcClient::new(host_plugin_chan);
        let registration_server = RpcServerBuilder::new().start(host_runtime_chan, None);

        let response = host_client
            .call("GetSecret", serde_json::json!({"id": "db/password"}), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response["id"], "db/password");
        assert_eq!(response["value"], serde_json::json!(b"value-for-db/password".to_vec()));

        cancel.cancel();
        let _ = plugin_task.await;
        registration_server.close();
        host_mux.shutdown();
    }

    #[tokio::test]
    async fn builder_accepts_a_shutdown_hook() {
        let invoked = Arc::new(AtomicBool::new(false));
        let invoked_clone = Arc::clone(&invoked);
        let plugin = Plugin::builder("vault", "1.0", parse_pattern("db/**").unwrap(), |id| async move {
            Ok(SecretResponse::new(id.as_str().as_bytes().to_vec()))
        })
        .on_shutdown(move || {
            let invoked = Arc::clone(&invoked_clone);
            async move {
                invoked.store(true, Ordering::SeqCst);
            }
        })
        .build();

        (plugin.shutdown)().await;
        assert!(invoked.load(Ordering::SeqCst));
        assert_eq!(plugin.name(), "vault");
    }
}
