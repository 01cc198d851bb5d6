//! Plugin runtime (component C6): the host-side object that owns one
//! live plugin's transport, optional subprocess, registration outcome,
//! and `GetSecret` client stub.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secrets_core::{Envelope, Pattern, Request};
use secrets_wire::{RpcClient, RpcServerBuilder, RpcServerHandle};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::OnceCell;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{HostError, HostResult};
use crate::registration::{Handshake, PatternPolicy, RegistrationKind};

/// Where a runtime sits in its lifecycle (spec.md §3). `Spawning` and
/// `Handshaking` are internal to [`PluginRuntime::from_stream`]: by the
/// time a caller holds a `PluginRuntime`, the handshake has already
/// resolved one way or the other, so only `Serving`, `Closing`, and
/// `Closed` are externally observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Subprocess requested but not yet connected (internal only).
    Spawning,
    /// Registration handshake in flight (internal only).
    Handshaking,
    /// Registered and accepting `GetSecret` calls.
    Serving,
    /// `close()` has been called; tearing down.
    Closing,
    /// Fully torn down. Terminal.
    Closed,
}

fn state_from_code(code: u8) -> RuntimeState {
    match code {
        0 => RuntimeState::Spawning,
        1 => RuntimeState::Handshaking,
        2 => RuntimeState::Serving,
        3 => RuntimeState::Closing,
        _ => RuntimeState::Closed,
    }
}

/// Stable, handshake-derived facts about a runtime (spec.md §4.6
/// `data()`).
#[derive(Debug, Clone)]
pub struct RuntimeData {
    /// Registered plugin name, unique within the registry.
    pub name: String,
    /// Plugin-reported version string.
    pub version: String,
    /// The subtree of the identifier namespace this plugin serves.
    pub pattern: Pattern,
    /// How this runtime came to exist.
    pub kind: RegistrationKind,
}

#[derive(Debug, Deserialize)]
struct GetSecretResponse {
    id: String,
    value: Vec<u8>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    resolved_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One-per-plugin host-side object (component C6).
pub struct PluginRuntime {
    data: RuntimeData,
    state: AtomicU8,
    client: RpcClient,
    server: RpcServerHandle,
    mux: secrets_wire::MultiplexerHandle,
    exit: Option<ExitWatcher>,
    close_once: OnceCell<HostResult<()>>,
    shutdown_budget: Duration,
    request_timeout: Duration,
}

/// Owns a plugin's subprocess exclusively, on a dedicated task, so that
/// a host-initiated close and an unprompted crash are reported through
/// the same one-shot `wait` without two tasks racing to call it.
struct ExitWatcher {
    close_tx: std::sync::Mutex<Option<oneshot::Sender<()>>>,
    exit_rx: watch::Receiver<ExitOutcome>,
}

#[derive(Debug, Clone)]
enum ExitOutcome {
    Running,
    ExitedCleanly,
    Crashed(String),
}

impl ExitWatcher {
    fn spawn(mut child: Child, plugin_name: String) -> Self {
        let (close_tx, close_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(ExitOutcome::Running);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = close_rx => {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                    ExitOutcome::ExitedCleanly
                },
                status = child.wait() => match status {
                    Ok(status) if status.success() => ExitOutcome::ExitedCleanly,
                    Ok(status) if is_conventional_interrupt(&status) => ExitOutcome::ExitedCleanly,
                    Ok(status) => {
                        tracing::warn!(plugin = %plugin_name, status = ?status, "plugin exited abnormally");
                        ExitOutcome::Crashed(format!("{status:?}"))
                    },
                    Err(err) => {
                        tracing::warn!(plugin = %plugin_name, error = %err, "failed to wait for plugin subprocess");
                        ExitOutcome::Crashed(err.to_string())
                    },
                },
            };
            let _ = exit_tx.send(outcome);
        });
        Self {
            close_tx: std::sync::Mutex::new(Some(close_tx)),
            exit_rx,
        }
    }
}

impl PluginRuntime {
    /// Drive the full creation path for a plugin connection: split the
    /// stream into channels, install the registration handler, wait for
    /// the handshake to resolve, and on success produce a `Serving`
    /// runtime. On any failure the transport (and subprocess, if any)
    /// is torn down before returning the error.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_stream<S>(
        stream: S,
        child: Option<Child>,
        expected_name: Option<String>,
        engine_name: impl Into<String>,
        engine_version: impl Into<String>,
        registration_timeout: Duration,
        request_timeout: Duration,
        shutdown_budget: Duration,
        pattern_policy: PatternPolicy,
    ) -> HostResult<Arc<Self>>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (plugin_chan, runtime_chan, mux) = secrets_wire::mux::spawn(stream);
        let (handshake, result_rx) =
            Handshake::new(expected_name, engine_name, engine_version, registration_timeout, pattern_policy);
        let server = RpcServerBuilder::new()
            .route("RegisterPlugin", handshake.into_route())
            .start(runtime_chan, None);
        let client = RpcClient::new(plugin_chan);

        let record = match tokio::time::timeout(registration_timeout, result_rx).await {
            Ok(Ok(Ok(record))) => record,
            Ok(Ok(Err(err))) => {
                teardown(&server, &mux, child).await;
                return Err(err);
            },
            Ok(Err(_)) => {
                teardown(&server, &mux, child).await;
                return Err(HostError::RegistrationRejected(
                    "registration result channel closed before a value arrived".to_string(),
                ));
            },
            Err(_) => {
                teardown(&server, &mux, child).await;
                return Err(HostError::RegistrationTimeout);
            },
        };

        tracing::info!(plugin = %record.name, "plugin registered");

        let exit = child.map(|child| ExitWatcher::spawn(child, record.name.clone()));

        Ok(Arc::new(Self {
            data: RuntimeData {
                name: record.name,
                version: record.version,
                pattern: record.pattern,
                kind: record.kind,
            },
            state: AtomicU8::new(RuntimeState::Serving as u8),
            client,
            server,
            mux,
            exit,
            close_once: OnceCell::new(),
            shutdown_budget,
            request_timeout,
        }))
    }

    /// Stable facts about this plugin, fixed at handshake time.
    #[must_use]
    pub fn data(&self) -> &RuntimeData {
        &self.data
    }

    /// Current lifecycle state. Uses an atomic load, independent of any
    /// in-flight state transition's mutex.
    #[must_use]
    pub fn state(&self) -> RuntimeState {
        state_from_code(self.state.load(Ordering::SeqCst))
    }

    /// Issue a `GetSecret` call and enforce the post-condition that the
    /// returned envelope's id matches the request's id.
    ///
    /// Always returns a populated envelope; the accompanying `Option`
    /// is `Some` iff the call failed, per spec.md §4.12. Callers choose
    /// whether to propagate the error or just use the envelope.
    pub async fn get_secret(&self, request: &Request, cancel: &CancellationToken) -> (Envelope, Option<HostError>) {
        let params = serde_json::json!({ "id": request.id.as_str() });
        let call = self.client.call("GetSecret", params, self.request_timeout);

        let outcome = tokio::select! {
            result = call => result.map_err(HostError::from),
            _ = cancel.cancelled() => Err(HostError::Cancelled),
        };

        let raw = match outcome {
            Ok(value) => value,
            Err(err) => return (Envelope::error_for(request, &err), Some(err)),
        };

        let parsed: GetSecretResponse = match serde_json::from_value(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                let err = HostError::Provider(format!("malformed GetSecret response: {err}"));
                return (Envelope::error_for(request, &err), Some(err));
            },
        };

        if parsed.id != request.id.as_str() {
            let err = HostError::IdMismatch {
                expected: request.id.as_str().to_string(),
                got: parsed.id,
            };
            return (Envelope::error_for(request, &err), Some(err));
        }

        let mut envelope = Envelope::from_plugin_response(
            request.id.clone(),
            parsed.value,
            parsed.version,
            parsed.created_at,
            parsed.resolved_at,
            parsed.expires_at,
            chrono::Utc::now(),
        );
        envelope.stamp_provider(self.data.name.clone());
        (envelope, None)
    }

    /// Transition `Serving -> Closing -> Closed`. Idempotent: concurrent
    /// or repeated calls all observe the same underlying teardown
    /// outcome, including a [`HostError::PluginCrashed`] if the
    /// subprocess had already exited abnormally (spec.md §4.6).
    pub async fn close(&self) -> HostResult<()> {
        let result = self
            .close_once
            .get_or_init(|| async {
                self.state.store(RuntimeState::Closing as u8, Ordering::SeqCst);
                let budget = self.shutdown_budget;
                let outcome = tokio::time::timeout(budget, self.do_close()).await;
                self.state.store(RuntimeState::Closed as u8, Ordering::SeqCst);
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(HostError::Timeout),
                }
            })
            .await;
        result.clone()
    }

    async fn do_close(&self) -> HostResult<()> {
        self.server.close();
        self.mux.shutdown();

        let Some(exit) = &self.exit else {
            return Ok(());
        };
        if let Some(close_tx) = exit.close_tx.lock().unwrap().take() {
            let _ = close_tx.send(());
        }

        let mut rx = exit.exit_rx.clone();
        if rx.changed().await.is_err() {
            return Ok(());
        }
        match &*rx.borrow() {
            ExitOutcome::Crashed(cause) => Err(HostError::PluginCrashed {
                name: self.data.name.clone(),
                cause: cause.clone(),
            }),
            ExitOutcome::ExitedCleanly | ExitOutcome::Running => Ok(()),
        }
    }

    /// Resolves once this plugin's subprocess terminates on its own
    /// without a prior call to [`PluginRuntime::close`], but only for
    /// an abnormal exit. Resolves to `None` for a clean exit, a
    /// host-initiated close, or a runtime with no subprocess at all —
    /// so the task driving this never lingers past the plugin's life
    /// (spec.md §4.6, §8 scenario 5).
    pub async fn crashed(&self) -> Option<HostError> {
        let exit = self.exit.as_ref()?;
        let mut rx = exit.exit_rx.clone();
        rx.changed().await.ok()?;
        match &*rx.borrow() {
            ExitOutcome::Crashed(cause) => Some(HostError::PluginCrashed {
                name: self.data.name.clone(),
                cause: cause.clone(),
            }),
            ExitOutcome::ExitedCleanly | ExitOutcome::Running => None,
        }
    }
}

#[cfg(unix)]
fn is_conventional_interrupt(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    matches!(status.signal(), Some(libc_sigterm) if libc_sigterm == 15) || status.code() == Some(130)
}

#[cfg(not(unix))]
fn is_conventional_interrupt(status: &std::process::ExitStatus) -> bool {
    status.code() == Some(130)
}

async fn teardown(server: &RpcServerHandle, mux: &secrets_wire::MultiplexerHandle, child: Option<Child>) {
    server.close();
    mux.shutdown();
    if let Some(mut child) = child {
        let _ = child.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::accept_all;
    use secrets_core::parse_id;
    use secrets_wire::{RpcServerBuilder as ServerBuilder, mux};
    use tokio::io::duplex;

    #[tokio::test]
    async fn from_stream_succeeds_on_valid_registration() {
        let (host_side, plugin_side) = duplex(8192);

        let plugin_driver = tokio::spawn(async move {
            let (plugin_chan, runtime_chan, _mux) = mux::spawn(plugin_side);
            let client = RpcClient::new(runtime_chan);
            let reply = client
                .call(
                    "RegisterPlugin",
                    serde_json::json!({"name": "vault", "version": "1.0", "pattern": "db/**"}),
                    Duration::from_secs(2),
                )
                .await
                .unwrap();
            assert_eq!(reply["engine_name"], "secrets-engine");

            let _server = ServerBuilder::new()
                .route("GetSecret", |params| {
                    Box::pin(async move {
                        Ok(serde_json::json!({"id": params["id"], "value": [1,2,3]}))
                    })
                })
                .start(plugin_chan, None);
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let runtime = PluginRuntime::from_stream(
            host_side,
            None,
            None,
            "secrets-engine",
            "0.1.0",
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
            accept_all(),
        )
        .await
        .unwrap();

        assert_eq!(runtime.data().name, "vault");
        assert_eq!(runtime.state(), RuntimeState::Serving);

        let request = Request::new(parse_id("db/password").unwrap(), chrono::Utc::now());
        let token = CancellationToken::new();
        let (envelope, err) = runtime.get_secret(&request, &token).await;
        assert!(err.is_none());
        assert_eq!(envelope.value, Some(vec![1, 2, 3]));
        assert_eq!(envelope.provider.as_deref(), Some("vault"));

        plugin_driver.abort();
    }

    #[tokio::test]
    async fn from_stream_times_out_when_plugin_never_registers() {
        let (host_side, _plugin_side) = duplex(8192);
        let err = PluginRuntime::from_stream(
            host_side,
            None,
            None,
            "secrets-engine",
            "0.1.0",
            Duration::from_millis(50),
            Duration::from_secs(2),
            Duration::from_secs(2),
            accept_all(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HostError::RegistrationTimeout));
    }

    #[tokio::test]
    async fn crashed_reports_plugin_crashed_when_subprocess_dies_unprompted() {
        let (host_side, plugin_side) = duplex(8192);

        let plugin_driver = tokio::spawn(async move {
            let (plugin_chan, runtime_chan, _mux) = mux::spawn(plugin_side);
            let client = RpcClient::new(runtime_chan);
            client
                .call(
                    "RegisterPlugin",
                    serde_json::json!({"name": "vault", "version": "1.0", "pattern": "db/**"}),
                    Duration::from_secs(2),
                )
                .await
                .unwrap();
            let _server = ServerBuilder::new().start(plugin_chan, None);
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg("exit 7")
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let runtime = PluginRuntime::from_stream(
            host_side,
            Some(child),
            None,
            "secrets-engine",
            "0.1.0",
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
            accept_all(),
        )
        .await
        .unwrap();

        let crash = runtime.crashed().await;
        assert!(matches!(crash, Some(HostError::PluginCrashed { .. })));
        assert_eq!(runtime.state(), RuntimeState::Serving);

        plugin_driver.abort();
    }
}
