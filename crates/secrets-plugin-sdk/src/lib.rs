//! Plugin-side SDK mirror (component C11): the half of the protocol a
//! plugin author links against, symmetric to `secrets-host`'s view of
//! the same wire contract.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod plugin;
pub mod prelude;
mod transport;

pub use error::{PluginError, PluginResult};
pub use plugin::{Plugin, PluginBuilder, SecretResponse};
pub use transport::{ManualOptions, Transport, dial, from_env};
