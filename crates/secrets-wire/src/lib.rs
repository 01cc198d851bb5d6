//! `secrets-wire` — the duplex multiplexer (C3) and IPC/RPC layer (C4)
//! that every plugin connection in the secrets resolution engine is
//! built on.
//!
//! This crate knows nothing about secrets, plugins, or identifiers: it
//! turns one ordered, reliable, bidirectional byte stream into two
//! named logical channels and lets callers bind request/response RPC
//! endpoints onto them. `secrets-host` and `secrets-plugin-sdk` are the
//! two (host- and plugin-side) consumers of this crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod error;
pub mod message;
pub mod mux;
pub mod prelude;
pub mod rpc;

pub use bootstrap::{ENV_VAR, LaunchEnv};
pub use error::{WireError, WireResult};
pub use message::WireMessage;
pub use mux::{ChannelHandle, ChannelSender, MultiplexerHandle, PLUGIN_SERVICE, RUNTIME_SERVICE};
pub use rpc::{HEALTH_METHOD, RpcClient, RpcServerBuilder, RpcServerHandle};
