//! Transport determination (component C11, step 1): either decode the
//! host-supplied environment variable and open the inherited file
//! descriptor, or dial a socket path supplied by the embedding binary.

#![allow(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use secrets_wire::{ENV_VAR, LaunchEnv};
use tokio::net::UnixStream;

use crate::error::{PluginError, PluginResult};

/// Options for the "manual mode" dial path, used when a plugin is
/// started without the host's launch environment variable (e.g. run
/// under a debugger, or connected to a non-default host instance).
#[derive(Debug, Clone)]
pub struct ManualOptions {
    /// The name this plugin will register under.
    pub name: String,
    /// Budget for the registration handshake to complete.
    pub registration_timeout: Duration,
    /// Path to the host's listening Unix domain socket.
    pub socket_path: PathBuf,
}

/// The outcome of transport determination: the connected stream plus
/// the name and registration budget that came with it.
pub struct Transport {
    /// The name this plugin should register under.
    pub name: String,
    /// Budget for the registration handshake.
    pub registration_timeout: Duration,
    /// The connected stream to the host.
    pub stream: UnixStream,
}

/// Determine transport from the host-supplied environment variable, per
/// spec.md §4.11/§6: decode `{ name, registration_timeout, fd }` and
/// open a connection from the inherited file descriptor.
pub fn from_env() -> PluginResult<Transport> {
    let raw = std::env::var(ENV_VAR).map_err(|_| PluginError::InvalidEnvironment(format!("{ENV_VAR} is not set")))?;
    let launch_env = LaunchEnv::decode(&raw).map_err(|err| PluginError::InvalidEnvironment(err.to_string()))?;

    // SAFETY: `fd` names a file descriptor the host handed this process
    // across `exec`, validated non-negative and >= 3 by `LaunchEnv::decode`.
    // This process owns it exclusively and has not used it before now.
    let std_stream = unsafe { <std::os::unix::net::UnixStream as std::os::fd::FromRawFd>::from_raw_fd(launch_env.fd) };
    std_stream
        .set_nonblocking(true)
        .map_err(|err| PluginError::Dial(format!("failed to configure inherited socket: {err}")))?;
    let stream =
        UnixStream::from_std(std_stream).map_err(|err| PluginError::Dial(format!("failed to adopt inherited socket: {err}")))?;

    Ok(Transport {
        name: launch_env.name,
        registration_timeout: Duration::from_millis(launch_env.registration_timeout_ms),
        stream,
    })
}

/// Determine transport by dialing a socket path directly, for plugins
/// run outside the host's own launch mechanism.
pub async fn dial(options: ManualOptions) -> PluginResult<Transport> {
    if options.name.is_empty() {
        return Err(PluginError::InvalidEnvironment("plugin name must not be empty".to_string()));
    }
    let stream = UnixStream::connect(&options.socket_path)
        .await
        .map_err(|err| PluginError::Dial(format!("failed to connect to {}: {err}", options.socket_path.display())))?;
    Ok(Transport {
        name: options.name,
        registration_timeout: options.registration_timeout,
        stream,
    })
}
