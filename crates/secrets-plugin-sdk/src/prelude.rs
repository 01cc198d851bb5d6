//! Convenience re-exports for plugin binaries.

pub use crate::error::{PluginError, PluginResult};
pub use crate::plugin::{Plugin, PluginBuilder, SecretResponse};
pub use crate::transport::{ManualOptions, Transport, dial, from_env};
pub use secrets_core::{Id, Pattern, parse_id, parse_pattern};
