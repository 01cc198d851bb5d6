//! Envelope model (component C2, envelope half).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Id;
use crate::request::Request;

/// The record returned for every secret request, success or failure,
/// carrying provenance and timestamps.
///
/// `value` and `error` are mutually exclusive on the success/failure
/// paths; `provider` is stamped by the engine on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The identifier this envelope answers.
    pub id: Id,
    /// The resolved secret value, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
    /// Name of the plugin that served this request, stamped by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Opaque provider-supplied version tag for the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Error message, present only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the underlying value was created, if the provider supplied it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When this envelope was produced.
    pub resolved_at: DateTime<Utc>,
    /// When the value expires, if applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Build a success envelope from a plugin's raw response fields.
    ///
    /// `resolved_at` is set to `now` only if the plugin left it unset, per
    /// spec.md §4.2/§4.9. `provider` is always stamped by the caller
    /// after this constructor returns (the resolver is the one that
    /// knows which plugin served the request).
    #[must_use]
    pub fn from_plugin_response(
        id: Id,
        value: Vec<u8>,
        version: Option<String>,
        created_at: Option<DateTime<Utc>>,
        resolved_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            value: Some(value),
            provider: None,
            version,
            error: None,
            created_at,
            resolved_at: resolved_at.unwrap_or(now),
            expires_at,
        }
    }

    /// Build an error envelope carrying only `id`, `resolved_at = now`,
    /// and `error = err`'s message. No `value` is set.
    #[must_use]
    pub fn error_for(request: &Request, err: impl std::fmt::Display) -> Self {
        Self {
            id: request.id.clone(),
            value: None,
            provider: None,
            version: None,
            error: Some(err.to_string()),
            created_at: None,
            resolved_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Build an error envelope for a bare `id` (used when no full
    /// `Request` is in scope, e.g. in the restricted resolver).
    #[must_use]
    pub fn error_for_id(id: Id, err: impl std::fmt::Display) -> Self {
        Self {
            id,
            value: None,
            provider: None,
            version: None,
            error: Some(err.to_string()),
            created_at: None,
            resolved_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Stamp the serving plugin's registered name onto a success envelope.
    pub fn stamp_provider(&mut self, provider: impl Into<String>) {
        self.provider = Some(provider.into());
    }

    /// Whether this envelope represents a successful resolution.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::parse_id;

    #[test]
    fn error_for_carries_request_id_and_message() {
        let req = Request::new(parse_id("asked").unwrap(), Utc::now());
        let env = Envelope::error_for(&req, "boom");
        assert_eq!(env.id, req.id);
        assert_eq!(env.error.as_deref(), Some("boom"));
        assert!(env.value.is_none());
        assert!(!env.is_success());
    }

    #[test]
    fn from_plugin_response_defaults_resolved_at() {
        let now = Utc::now();
        let env = Envelope::from_plugin_response(
            parse_id("a/b").unwrap(),
            b"secret".to_vec(),
            None,
            None,
            None,
            None,
            now,
        );
        assert_eq!(env.resolved_at, now);
        assert!(env.is_success());
    }

    #[test]
    fn from_plugin_response_preserves_explicit_resolved_at() {
        let now = Utc::now();
        let explicit = now - chrono::Duration::seconds(30);
        let env = Envelope::from_plugin_response(
            parse_id("a/b").unwrap(),
            b"secret".to_vec(),
            None,
            None,
            Some(explicit),
            None,
            now,
        );
        assert_eq!(env.resolved_at, explicit);
    }

    #[test]
    fn serde_round_trip_omits_none_fields() {
        let req = Request::new(parse_id("a/b").unwrap(), Utc::now());
        let env = Envelope::error_for(&req, "nope");
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("value").is_none());
        assert!(json.get("provider").is_none());
        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, env.id);
        assert_eq!(back.error, env.error);
    }
}
