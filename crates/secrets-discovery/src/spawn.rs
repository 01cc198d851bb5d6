//! The "Launched" creation path of the plugin runtime (spec.md §4.6):
//! hand the child one end of a freshly created socket pair as a known
//! file descriptor, keep the other end, and drive the registration
//! handshake over it.

use std::sync::Arc;

use secrets_host::{EngineConfig, HostError, HostResult, PluginRuntime, Registry};

use crate::launcher::Launcher;

/// Spawn `launcher`'s executable, complete its registration handshake,
/// and insert the resulting runtime into `registry`.
pub async fn launch(
    launcher: &Launcher,
    registry: &Arc<Registry>,
    config: &EngineConfig,
    engine_name: &str,
    engine_version: &str,
    pattern_policy: secrets_host::PatternPolicy,
) -> HostResult<Arc<PluginRuntime>> {
    let runtime = imp::spawn_and_handshake(launcher, config, engine_name, engine_version, pattern_policy).await?;
    match registry.register(Arc::clone(&runtime)) {
        Ok(_remove) => Ok(runtime),
        Err(err) => {
            let _ = runtime.close().await;
            Err(err)
        },
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
mod imp {
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream as StdUnixStream;
    use std::os::unix::process::CommandExt as _;

    use secrets_host::{EngineConfig, HostError, HostResult, PatternPolicy, PluginRuntime};
    use secrets_wire::LaunchEnv;
    use tokio::net::UnixStream;

    use crate::launcher::Launcher;

    /// The file descriptor number the child is told to dial, fixed
    /// since the child's environment only needs to carry one number.
    const CHILD_FD: i32 = 3;

    pub async fn spawn_and_handshake(
        launcher: &Launcher,
        config: &EngineConfig,
        engine_name: &str,
        engine_version: &str,
        pattern_policy: PatternPolicy,
    ) -> HostResult<std::sync::Arc<PluginRuntime>> {
        let (host_fd, child_fd) = nix::sys::socket::socketpair(
            nix::sys::socket::AddressFamily::Unix,
            nix::sys::socket::SockType::Stream,
            None,
            nix::sys::socket::SockFlag::empty(),
        )
        .map_err(|err| HostError::Provider(format!("socketpair failed: {err}")))?;

        let timeout_ms = u64::try_from(config.registration_timeout.as_millis()).unwrap_or(u64::MAX);
        let launch_env = LaunchEnv {
            name: launcher.display_name.clone(),
            registration_timeout_ms: timeout_ms,
            fd: CHILD_FD,
        };
        let encoded = launch_env
            .encode()
            .map_err(|err| HostError::Provider(format!("failed to encode launch environment: {err}")))?;

        let child_raw_fd = child_fd.as_raw_fd();
        let mut command = tokio::process::Command::new(&launcher.executable);
        command.env(secrets_wire::ENV_VAR, encoded).kill_on_drop(true);

        // SAFETY: this closure runs in the forked child, before exec,
        // and only calls the async-signal-safe `dup2`.
        unsafe {
            command.pre_exec(move || {
                nix::unistd::dup2(child_raw_fd, CHILD_FD).map_err(std::io::Error::from)?;
                Ok(())
            });
        }

        let spawn_result = command.spawn();
        // The child inherited its own copy of `child_fd` across fork;
        // the parent's copy is only needed long enough for `pre_exec`
        // to read its number, not its contents.
        drop(child_fd);
        let child = spawn_result.map_err(|err| HostError::Provider(format!("failed to spawn plugin: {err}")))?;

        let std_stream = StdUnixStream::from(host_fd);
        std_stream
            .set_nonblocking(true)
            .map_err(|err| HostError::Provider(format!("failed to configure plugin socket: {err}")))?;
        let stream = UnixStream::from_std(std_stream)
            .map_err(|err| HostError::Provider(format!("failed to hand socket to runtime: {err}")))?;

        PluginRuntime::from_stream(
            stream,
            Some(child),
            Some(launcher.display_name.clone()),
            engine_name.to_string(),
            engine_version.to_string(),
            config.registration_timeout,
            config.request_timeout,
            config.shutdown_budget,
            pattern_policy,
        )
        .await
    }
}

#[cfg(not(unix))]
mod imp {
    use secrets_host::{EngineConfig, HostError, HostResult, PatternPolicy, PluginRuntime};

    use crate::launcher::Launcher;

    pub async fn spawn_and_handshake(
        _launcher: &Launcher,
        _config: &EngineConfig,
        _engine_name: &str,
        _engine_version: &str,
        _pattern_policy: PatternPolicy,
    ) -> HostResult<std::sync::Arc<PluginRuntime>> {
        Err(HostError::Provider(
            "launching plugin subprocesses is only supported on POSIX hosts".to_string(),
        ))
    }
}
