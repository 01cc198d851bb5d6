//! The IPC layer (component C4): binds an RPC client and an RPC server
//! onto the two logical channels produced by [`crate::mux`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{WireError, WireResult};
use crate::message::WireMessage;
use crate::mux::{ChannelHandle, ChannelSender};

/// Method name for the readiness probe every side exposes on its channel
/// (spec.md §4.4/§6: `GET /health -> "ok"`).
pub const HEALTH_METHOD: &str = "health";

/// Prefix the dispatch loop uses for its "no such method" error string,
/// recognized by the client reader to surface [`WireError::NoSuchMethod`]
/// instead of a generic [`WireError::Provider`].
const NO_SUCH_METHOD_PREFIX: &str = "no such method: ";

type HandlerFuture = BoxFuture<'static, Result<Value, String>>;
type Handler = Box<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// A client-side RPC stub: issues requests on a channel and correlates
/// their responses.
///
/// `GetSecret`/`Shutdown` (host→plugin) and `RegisterPlugin` (plugin→host)
/// are both just named calls through this type; there is nothing
/// method-specific in `RpcClient` itself.
pub struct RpcClient {
    sender: ChannelSender,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<WireResult<Value>>>>>,
    next_id: AtomicU64,
    _reader_task: Arc<tokio::task::JoinHandle<()>>,
}

impl RpcClient {
    /// Take ownership of a [`ChannelHandle`] and start correlating its
    /// inbound `Response` messages with outstanding calls.
    #[must_use]
    pub fn new(mut channel: ChannelHandle) -> Self {
        let sender = channel.sender();
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<WireResult<Value>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let pending_task = Arc::clone(&pending);

        let reader_task = tokio::spawn(async move {
            while let Some(msg) = channel.recv().await {
                match msg {
                    WireMessage::Response { id, result } => {
                        if let Some(tx) = pending_task.lock().unwrap().remove(&id) {
                            let mapped = result.map_err(|message| match message.strip_prefix(NO_SUCH_METHOD_PREFIX) {
                                Some(method) => WireError::NoSuchMethod(method.to_string()),
                                None => WireError::Provider(message),
                            });
                            let _ = tx.send(mapped);
                        }
                    },
                    WireMessage::Request { .. } => {
                        // A pure client channel is not expected to receive
                        // requests; ignore rather than fail the whole link.
                        tracing::debug!("RpcClient received unexpected request, ignoring");
                    },
                }
            }
            // Channel closed: fail every outstanding call.
            for (_, tx) in pending_task.lock().unwrap().drain() {
                let _ = tx.send(Err(WireError::Closed));
            }
        });

        Self {
            sender,
            pending,
            next_id: AtomicU64::new(1),
            _reader_task: Arc::new(reader_task),
        }
    }

    /// Issue a call and wait up to `timeout` for its response.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Closed`] if the channel closes before or
    /// during the call, [`WireError::Timeout`] if `timeout` elapses
    /// first, and [`WireError::Provider`] if the peer replied with an
    /// application-level error.
    pub async fn call(&self, method: &str, params: Value, timeout: Duration) -> WireResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let request = WireMessage::Request {
            id,
            method: method.to_string(),
            params,
        };
        if self.sender.send(request).await.is_err() {
            self.pending.lock().unwrap().remove(&id);
            return Err(WireError::Closed);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(WireError::Closed),
            Err(_) => {
                self.pending.lock().unwrap().remove(&id);
                Err(WireError::Timeout)
            },
        }
    }

    /// Convenience wrapper for the `health` call every side exposes.
    pub async fn health(&self, timeout: Duration) -> WireResult<()> {
        self.call(HEALTH_METHOD, Value::Null, timeout).await?;
        Ok(())
    }
}

/// Builder for the set of methods an [`RpcServer`] will dispatch.
#[derive(Default)]
pub struct RpcServerBuilder {
    routes: HashMap<String, Handler>,
}

impl RpcServerBuilder {
    /// Start building a route table, pre-registering the `health` route.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder
            .routes
            .insert(HEALTH_METHOD.to_string(), Box::new(|_params| {
                Box::pin(async { Ok(Value::String("ok".to_string())) })
            }));
        builder
    }

    /// Register a handler for `method`. Registering the same name twice
    /// replaces the previous handler.
    #[must_use]
    pub fn route<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> HandlerFuture + Send + Sync + 'static,
    {
        self.routes.insert(method.into(), Box::new(handler));
        self
    }

    /// Bind this route table onto `channel` and start serving.
    #[must_use]
    pub fn start(
        self,
        mut channel: ChannelHandle,
        fail_sink: Option<mpsc::Sender<WireError>>,
    ) -> RpcServerHandle {
        let sender = channel.sender();
        let routes = Arc::new(self.routes);
        let token = CancellationToken::new();
        let server_token = token.clone();
        let (done_tx, done_rx) = watch::channel(false);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = server_token.cancelled() => break,
                    msg = channel.recv() => {
                        match msg {
                            None => break,
                            Some(WireMessage::Request { id, method, params }) => {
                                let routes = Arc::clone(&routes);
                                let sender = sender.clone();
                                let fail_sink = fail_sink.clone();
                                tokio::spawn(async move {
                                    let result = match routes.get(&method) {
                                        Some(handler) => handler(params).await,
                                        None => Err(format!("{NO_SUCH_METHOD_PREFIX}{method}")),
                                    };
                                    if let Err(message) = &result {
                                        if let Some(sink) = &fail_sink {
                                            let _ = sink.try_send(WireError::Provider(message.clone()));
                                        }
                                    }
                                    let _ = sender.send(WireMessage::Response { id, result }).await;
                                });
                            },
                            Some(WireMessage::Response { .. }) => {
                                tracing::debug!("RpcServer received unexpected response, ignoring");
                            },
                        }
                    },
                }
            }
            let _ = done_tx.send(true);
        });

        RpcServerHandle { token, done_rx }
    }
}

/// Handle returned by [`RpcServerBuilder::start`]: `wait` resolves when
/// the accept loop terminates, `close` is idempotent.
pub struct RpcServerHandle {
    token: CancellationToken,
    done_rx: watch::Receiver<bool>,
}

impl RpcServerHandle {
    /// Wait for the server loop to terminate (local close or peer
    /// disconnect).
    pub async fn wait(&self) {
        let mut rx = self.done_rx.clone();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Stop the server. Idempotent.
    pub fn close(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux;
    use tokio::io::duplex;

    #[tokio::test]
    async fn client_server_round_trip() {
        let (a, b) = duplex(4096);
        let (plugin_a, _runtime_a, _handle_a) = mux::spawn(a);
        let (plugin_b, _runtime_b, _handle_b) = mux::spawn(b);

        let server = RpcServerBuilder::new()
            .route("GetSecret", |params| {
                Box::pin(async move { Ok(serde_json::json!({"echo": params})) })
            })
            .start(plugin_b, None);

        let client = RpcClient::new(plugin_a);
        let result = client
            .call(
                "GetSecret",
                serde_json::json!({"id": "db/password"}),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(result["echo"]["id"], "db/password");

        server.close();
        server.wait().await;
    }

    #[tokio::test]
    async fn health_route_is_builtin() {
        let (a, b) = duplex(4096);
        let (plugin_a, _runtime_a, _handle_a) = mux::spawn(a);
        let (plugin_b, _runtime_b, _handle_b) = mux::spawn(b);

        let server = RpcServerBuilder::new().start(plugin_b, None);
        let client = RpcClient::new(plugin_a);
        client.health(Duration::from_secs(1)).await.unwrap();
        server.close();
    }

    #[tokio::test]
    async fn unknown_method_surfaces_as_no_such_method() {
        let (a, b) = duplex(4096);
        let (plugin_a, _runtime_a, _handle_a) = mux::spawn(a);
        let (plugin_b, _runtime_b, _handle_b) = mux::spawn(b);

        let server = RpcServerBuilder::new().start(plugin_b, None);
        let client = RpcClient::new(plugin_a);
        let err = client
            .call("NoSuchThing", Value::Null, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WireError::NoSuchMethod(method) if method == "NoSuchThing"));
        server.close();
    }

    #[tokio::test]
    async fn timeout_fires_when_no_handler_replies() {
        let (a, b) = duplex(4096);
        let (plugin_a, _runtime_a, _handle_a) = mux::spawn(a);
        let (plugin_b, _runtime_b, _handle_b) = mux::spawn(b);

        let server = RpcServerBuilder::new()
            .route("Hang", |_params| Box::pin(futures::future::pending()))
            .start(plugin_b, None);
        let client = RpcClient::new(plugin_a);
        let err = client
            .call("Hang", Value::Null, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, WireError::Timeout));
        server.close();
    }

    #[tokio::test]
    async fn closing_channel_fails_outstanding_calls() {
        let (a, b) = duplex(4096);
        let (plugin_a, _runtime_a, handle_a) = mux::spawn(a);
        let (plugin_b, _runtime_b, _handle_b) = mux::spawn(b);

        let server = RpcServerBuilder::new()
            .route("Hang", |_params| Box::pin(futures::future::pending()))
            .start(plugin_b, None);
        let client = RpcClient::new(plugin_a);
        let call = client.call("Hang", Value::Null, Duration::from_secs(5));
        handle_a.shutdown();
        let err = call.await.unwrap_err();
        assert!(matches!(err, WireError::Closed));
        server.close();
    }
}
