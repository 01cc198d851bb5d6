//! Request model (component C2, request half).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Id;

/// A request to resolve a secret.
///
/// Only `id` is mandatory for routing; `provider` pins the request to a
/// single plugin name (spec.md §4.9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// The secret identifier being requested.
    pub id: Id,
    /// If set, only the plugin registered under this exact name may serve
    /// the request.
    pub provider: Option<String>,
    /// Opaque identifier for the requesting client, for provenance only.
    pub client_id: Option<String>,
    /// When the request was created.
    pub requested_at: DateTime<Utc>,
}

impl Request {
    /// Build a request for `id` with no pin and no client id, stamped
    /// with the given `requested_at`.
    #[must_use]
    pub fn new(id: Id, requested_at: DateTime<Utc>) -> Self {
        Self {
            id,
            provider: None,
            client_id: None,
            requested_at,
        }
    }

    /// Pin this request to a specific provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach a client id for provenance.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::parse_id;

    #[test]
    fn builder_round_trip() {
        let now = Utc::now();
        let req = Request::new(parse_id("db/password").unwrap(), now)
            .with_provider("vault")
            .with_client_id("session-1");
        assert_eq!(req.provider.as_deref(), Some("vault"));
        assert_eq!(req.client_id.as_deref(), Some("session-1"));
        assert_eq!(req.requested_at, now);
    }

    #[test]
    fn serde_round_trip() {
        let req = Request::new(parse_id("a/b").unwrap(), Utc::now());
        let json = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
