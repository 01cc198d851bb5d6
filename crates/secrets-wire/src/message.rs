//! The small JSON-RPC-like message shape multiplexed over each logical
//! channel. Framing (how a message's bytes are delimited on the wire)
//! lives in [`crate::mux`]; this module only defines the message
//! payload itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single message on a logical channel: either a call or a reply to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireMessage {
    /// An RPC call.
    Request {
        /// Correlates a `Request` with its `Response`.
        id: u64,
        /// Method name, e.g. `"GetSecret"` or `"RegisterPlugin"`.
        method: String,
        /// Method parameters, opaque to the multiplexer.
        params: Value,
    },
    /// The reply to a previously-sent `Request`.
    Response {
        /// Matches the `id` of the originating `Request`.
        id: u64,
        /// `Ok` carries the method's return value; `Err` carries the
        /// peer's error message.
        result: Result<Value, String>,
    },
}

impl WireMessage {
    /// The correlation id of this message, regardless of variant.
    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            WireMessage::Request { id, .. } | WireMessage::Response { id, .. } => *id,
        }
    }
}
