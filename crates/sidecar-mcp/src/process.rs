//! Spawning and stopping the tool-server process.

use crate::config::ServerConfig;
use crate::error::RpcError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// How long a stopped server gets to exit on its own before being killed.
const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a running tool-server process.
pub(crate) struct ServerProcess {
    child: Option<Child>,
}

impl ServerProcess {
    /// Spawn the server with stdin, stdout, and stderr all piped.
    pub(crate) fn spawn(
        config: &ServerConfig,
    ) -> Result<(Self, ChildStdin, ChildStdout, ChildStderr), RpcError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| RpcError::Spawn {
            name: config.command.clone(),
            source: e,
        })?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        Ok((Self { child: Some(child) }, stdin, stdout, stderr))
    }

    /// Stop the server, waiting briefly for a clean exit before killing it.
    ///
    /// Stopping an already-stopped server is a no-op. In-flight requests are
    /// not touched here; the transport fails them when it observes the
    /// output stream close.
    pub(crate) async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        let graceful = tokio::time::timeout(GRACEFUL_EXIT_TIMEOUT, child.wait()).await;
        if graceful.is_err() {
            let _ = child.kill().await;
        }
    }
}
