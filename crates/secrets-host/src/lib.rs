//! `secrets-host` — the host side of a single plugin connection and
//! the registry that tracks every connection at once.
//!
//! Covers the registration handshake (C5), the plugin runtime state
//! machine (C6), the plugin registry (C7), and the error mapping
//! between transport faults and domain error kinds (C12). Nothing here
//! knows how plugins are discovered or launched (`secrets-discovery`)
//! or how requests are routed across the registry (`secrets-resolver`).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod prelude;
pub mod registration;
pub mod registry;
pub mod runtime;

pub use config::EngineConfig;
pub use error::{HostError, HostResult, JoinedError};
pub use registration::{Handshake, PatternPolicy, RegistrationKind, RegistrationRecord, accept_all};
pub use registry::{RemoveFn, Registry};
pub use runtime::{PluginRuntime, RuntimeData, RuntimeState};
