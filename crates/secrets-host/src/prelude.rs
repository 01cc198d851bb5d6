//! Convenience re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::error::{HostError, HostResult, JoinedError};
pub use crate::registration::{Handshake, PatternPolicy, RegistrationKind, RegistrationRecord, accept_all};
pub use crate::registry::{RemoveFn, Registry};
pub use crate::runtime::{PluginRuntime, RuntimeData, RuntimeState};
