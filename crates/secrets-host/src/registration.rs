//! Registration handshake (component C5): the single-shot RPC by which
//! a plugin declares its identity and the host accepts or refuses it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use secrets_core::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{HostError, HostResult};

/// How a runtime came to exist, stamped onto its [`RegistrationRecord`]
/// at handshake time and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    /// The host spawned this plugin's subprocess itself.
    EngineLaunched,
    /// The host accepted an already-connected stream from elsewhere.
    ExternallyConnected,
}

/// The immutable record produced by a successful handshake (spec.md §3:
/// "Plugin registration record (immutable after handshake)").
#[derive(Debug, Clone)]
pub struct RegistrationRecord {
    /// Non-empty, unique within the registry.
    pub name: String,
    /// Plugin-reported version string, opaque to the host.
    pub version: String,
    /// The subtree of the identifier namespace this plugin serves.
    pub pattern: Pattern,
    /// How this runtime came to exist.
    pub kind: RegistrationKind,
}

/// A predicate the host uses to accept or refuse a plugin-declared
/// pattern. The default policy (see [`accept_all`]) accepts everything.
pub type PatternPolicy = Arc<dyn Fn(&Pattern) -> bool + Send + Sync>;

/// The default pattern policy named in spec.md §4.5: accept all.
#[must_use]
pub fn accept_all() -> PatternPolicy {
    Arc::new(|_pattern: &Pattern| true)
}

#[derive(Debug, Deserialize)]
struct RegisterParams {
    #[serde(default)]
    name: Option<String>,
    version: String,
    pattern: String,
}

#[derive(Debug, Serialize)]
struct EngineReply {
    engine_name: String,
    engine_version: String,
    request_timeout_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    optional_config: Option<Value>,
}

struct Inner {
    already: AtomicBool,
    result_tx: Mutex<Option<oneshot::Sender<HostResult<RegistrationRecord>>>>,
    expected_name: Option<String>,
    engine_name: String,
    engine_version: String,
    request_timeout: Duration,
    pattern_policy: PatternPolicy,
}

impl Inner {
    fn send_result(&self, result: HostResult<RegistrationRecord>) {
        if let Some(tx) = self.result_tx.lock().unwrap().take() {
            // A dropped receiver (caller gave up waiting) surfaces as
            // an `Err` here; we have nowhere further to report it, so
            // the handler's own return value is the only signal the
            // plugin gets in that case.
            let _ = tx.send(result);
        }
    }
}

/// Installed once as the `RegisterPlugin` handler on a runtime's
/// runtime-service channel.
///
/// `expected_name` distinguishes the two creation paths from spec.md
/// §4.6: `Some(name)` for engine-launched plugins (the plugin's
/// self-reported name, if any, must match `name`); `None` for
/// externally-connected plugins (the plugin must supply a non-empty
/// name itself).
pub struct Handshake {
    inner: Arc<Inner>,
}

impl Handshake {
    /// Build a handshake and the one-shot receiver its outcome is
    /// delivered on. The receiver is spec.md §4.5's "1-capacity result
    /// channel": at most one value is ever sent, and sending never
    /// blocks.
    #[must_use]
    pub fn new(
        expected_name: Option<String>,
        engine_name: impl Into<String>,
        engine_version: impl Into<String>,
        request_timeout: Duration,
        pattern_policy: PatternPolicy,
    ) -> (Self, oneshot::Receiver<HostResult<RegistrationRecord>>) {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::new(Inner {
            already: AtomicBool::new(false),
            result_tx: Mutex::new(Some(tx)),
            expected_name,
            engine_name: engine_name.into(),
            engine_version: engine_version.into(),
            request_timeout,
            pattern_policy,
        });
        (Self { inner }, rx)
    }

    /// Turn this handshake into the RPC handler closure installed on
    /// the runtime-service channel's `RegisterPlugin` route.
    #[must_use]
    pub fn into_route(self) -> impl Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync + 'static {
        let inner = self.inner;
        move |params: Value| {
            let inner = Arc::clone(&inner);
            Box::pin(async move { handle(&inner, params) })
        }
    }
}

fn handle(inner: &Inner, params: Value) -> Result<Value, String> {
    if inner.already.swap(true, Ordering::SeqCst) {
        return Err("plugin already registered".to_string());
    }

    let parsed: RegisterParams = match serde_json::from_value(params) {
        Ok(parsed) => parsed,
        Err(err) => {
            let message = format!("malformed registration request: {err}");
            inner.send_result(Err(HostError::RegistrationRejected(message.clone())));
            return Err(message);
        },
    };

    let pattern = match secrets_core::parse_pattern(parsed.pattern.clone()) {
        Ok(pattern) => pattern,
        Err(err) => {
            let message = format!("invalid pattern {:?}: {err}", parsed.pattern);
            inner.send_result(Err(HostError::RegistrationRejected(message.clone())));
            return Err(message);
        },
    };

    if !(inner.pattern_policy)(&pattern) {
        let message = format!("pattern {pattern} not accepted by host policy");
        inner.send_result(Err(HostError::RegistrationRejected(message.clone())));
        return Err(message);
    }

    let (name, kind) = match &inner.expected_name {
        Some(expected) => match &parsed.name {
            None => (expected.clone(), RegistrationKind::EngineLaunched),
            Some(actual) if actual == expected => (expected.clone(), RegistrationKind::EngineLaunched),
            Some(actual) => {
                let message = format!("launched plugin reported name {actual:?}, expected {expected:?}");
                inner.send_result(Err(HostError::RegistrationRejected(message.clone())));
                return Err(message);
            },
        },
        None => match parsed.name.filter(|n| !n.is_empty()) {
            Some(name) => (name, RegistrationKind::ExternallyConnected),
            None => {
                let message = "name is required for externally connected plugins".to_string();
                inner.send_result(Err(HostError::RegistrationRejected(message.clone())));
                return Err(message);
            },
        },
    };

    let record = RegistrationRecord {
        name,
        version: parsed.version,
        pattern,
        kind,
    };

    if inner.send_result_checked(Ok(record.clone())).is_err() {
        return Err("registration rejected".to_string());
    }

    let reply = EngineReply {
        engine_name: inner.engine_name.clone(),
        engine_version: inner.engine_version.clone(),
        request_timeout_seconds: inner.request_timeout.as_secs_f64(),
        optional_config: None,
    };
    serde_json::to_value(reply).map_err(|err| err.to_string())
}

impl Inner {
    /// Like [`Inner::send_result`] but reports whether the receiver was
    /// still around to take it — a dropped receiver means the caller
    /// gave up waiting, which spec.md §4.5 treats as "registration
    /// rejected".
    fn send_result_checked(&self, result: HostResult<RegistrationRecord>) -> Result<(), ()> {
        match self.result_tx.lock().unwrap().take() {
            Some(tx) => tx.send(result).map_err(|_| ()),
            None => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(expected_name: Option<&str>) -> (Handshake, oneshot::Receiver<HostResult<RegistrationRecord>>) {
        Handshake::new(
            expected_name.map(str::to_string),
            "secrets-engine",
            "0.1.0",
            Duration::from_secs(5),
            accept_all(),
        )
    }

    #[tokio::test]
    async fn accepts_externally_connected_plugin_with_name() {
        let (hs, rx) = handshake(None);
        let route = hs.into_route();
        let reply = route(serde_json::json!({"name": "vault", "version": "1.0", "pattern": "db/**"}))
            .await
            .unwrap();
        assert_eq!(reply["engine_name"], "secrets-engine");
        let record = rx.await.unwrap().unwrap();
        assert_eq!(record.name, "vault");
        assert_eq!(record.kind, RegistrationKind::ExternallyConnected);
    }

    #[tokio::test]
    async fn rejects_externally_connected_plugin_without_name() {
        let (hs, rx) = handshake(None);
        let route = hs.into_route();
        let err = route(serde_json::json!({"version": "1.0", "pattern": "**"})).await.unwrap_err();
        assert!(err.contains("name is required"));
        assert!(matches!(rx.await.unwrap(), Err(HostError::RegistrationRejected(_))));
    }

    #[tokio::test]
    async fn launched_plugin_name_defaults_to_expected() {
        let (hs, rx) = handshake(Some("vault"));
        let route = hs.into_route();
        route(serde_json::json!({"version": "1.0", "pattern": "**"})).await.unwrap();
        let record = rx.await.unwrap().unwrap();
        assert_eq!(record.name, "vault");
        assert_eq!(record.kind, RegistrationKind::EngineLaunched);
    }

    #[tokio::test]
    async fn launched_plugin_name_mismatch_is_rejected() {
        let (hs, rx) = handshake(Some("vault"));
        let route = hs.into_route();
        let err = route(serde_json::json!({"name": "other", "version": "1.0", "pattern": "**"}))
            .await
            .unwrap_err();
        assert!(err.contains("expected"));
        assert!(rx.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn second_call_is_rejected_without_touching_result_channel() {
        let (hs, rx) = handshake(None);
        let route = hs.into_route();
        route(serde_json::json!({"name": "vault", "version": "1.0", "pattern": "**"}))
            .await
            .unwrap();
        let err = route(serde_json::json!({"name": "vault", "version": "1.0", "pattern": "**"}))
            .await
            .unwrap_err();
        assert!(err.contains("already registered"));
        assert!(rx.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn invalid_pattern_is_rejected() {
        let (hs, rx) = handshake(None);
        let route = hs.into_route();
        let err = route(serde_json::json!({"name": "vault", "version": "1.0", "pattern": "a*a"}))
            .await
            .unwrap_err();
        assert!(err.contains("invalid pattern"));
        assert!(rx.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn dropped_receiver_rejects_without_blocking() {
        let (hs, rx) = handshake(None);
        drop(rx);
        let route = hs.into_route();
        let err = route(serde_json::json!({"name": "vault", "version": "1.0", "pattern": "**"}))
            .await
            .unwrap_err();
        assert_eq!(err, "registration rejected");
    }
}
