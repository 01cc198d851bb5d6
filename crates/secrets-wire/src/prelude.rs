//! Convenience re-exports for downstream crates.

pub use crate::bootstrap::{ENV_VAR, LaunchEnv};
pub use crate::error::{WireError, WireResult};
pub use crate::message::WireMessage;
pub use crate::mux::{ChannelHandle, ChannelSender, MultiplexerHandle, PLUGIN_SERVICE, RUNTIME_SERVICE};
pub use crate::rpc::{HEALTH_METHOD, RpcClient, RpcServerBuilder, RpcServerHandle};
