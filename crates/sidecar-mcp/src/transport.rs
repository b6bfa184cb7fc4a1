//! Stdio transport: ties the process, framer, and request tracker together.
//!
//! Three background tasks per connection: a writer draining a channel of
//! serialized lines into the server's stdin, a reader pushing stdout chunks
//! through the framer and dispatching envelopes in arrival order, and a
//! stderr logger for the server's diagnostic stream.

use crate::config::ServerConfig;
use crate::correlator::RequestTracker;
use crate::error::RpcError;
use crate::framer::LineFramer;
use crate::jsonrpc::{RpcNotification, RpcRequest, RpcResponse};
use crate::process::ServerProcess;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Fixed window a request may wait for its response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Async stdio transport for one tool-server process.
pub(crate) struct StdioTransport {
    tracker: Arc<RequestTracker>,
    write_tx: mpsc::Sender<String>,
    closed: Arc<AtomicBool>,
    process: Mutex<ServerProcess>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
    stderr_handle: JoinHandle<()>,
    request_timeout: Duration,
}

impl StdioTransport {
    /// Spawn the server process and start the background tasks.
    pub(crate) fn spawn(config: &ServerConfig) -> Result<Self, RpcError> {
        let (process, stdin, stdout, stderr) = ServerProcess::spawn(config)?;

        let tracker = Arc::new(RequestTracker::new());
        let closed = Arc::new(AtomicBool::new(false));

        // Writer task: one whole line per channel message, so concurrent
        // senders never interleave mid-write.
        let (write_tx, mut write_rx) = mpsc::channel::<String>(64);
        let writer_handle = tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = write_rx.recv().await {
                if stdin.write_all(msg.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        // Reader task: raw chunks through the framer, envelopes to the
        // tracker in arrival order. EOF means the server is gone — fail
        // whatever is still pending so callers don't sit out their timeouts.
        let reader_tracker = Arc::clone(&tracker);
        let reader_closed = Arc::clone(&closed);
        let reader_handle = tokio::spawn(async move {
            let mut stdout = stdout;
            let mut framer = LineFramer::new();
            let mut chunk = [0u8; 4096];
            loop {
                match stdout.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        for resp in framer.feed(&chunk[..n]) {
                            reader_tracker.complete(resp).await;
                        }
                    }
                }
            }
            reader_closed.store(true, Ordering::Release);
            reader_tracker.fail_all().await;
        });

        // Stderr task: diagnostic stream, logged line by line, never parsed.
        let stderr_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("server stderr: {line}");
            }
        });

        Ok(Self {
            tracker,
            write_tx,
            closed,
            process: Mutex::new(process),
            reader_handle,
            writer_handle,
            stderr_handle,
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    /// Send a request and wait for the correlated response.
    pub(crate) async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<RpcResponse, RpcError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::TransportClosed);
        }

        let (id, rx) = self.tracker.register().await;
        let request = RpcRequest::new(id.clone(), method, params);
        let serialized = serde_json::to_string(&request)?;

        if self.write_tx.send(serialized).await.is_err() {
            self.tracker.forget(&id).await;
            return Err(RpcError::TransportClosed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            // Sender dropped: the reader task cleared the pending table
            Ok(Err(_)) => Err(RpcError::TransportClosed),
            Err(_) => {
                self.tracker.forget(&id).await;
                Err(RpcError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    /// Send a request and unwrap its result, mapping a server-reported
    /// error member to [`RpcError::Remote`].
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        let resp = self.send_request(method, params).await?;

        if let Some(err) = resp.error {
            return Err(RpcError::Remote {
                message: err.message,
                code: err.code,
            });
        }
        resp.result.ok_or_else(|| {
            RpcError::Protocol(format!("response to '{method}' has neither result nor error"))
        })
    }

    /// Send a notification (fire-and-forget, no response expected).
    pub(crate) async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), RpcError> {
        let notification = RpcNotification::new(method, params);
        let serialized = serde_json::to_string(&notification)?;

        self.write_tx
            .send(serialized)
            .await
            .map_err(|_| RpcError::TransportClosed)?;

        Ok(())
    }

    /// Whether the server's output stream has closed.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shut down: close the server's stdin, stop the process, drop the tasks.
    pub(crate) async fn shutdown(self) {
        // Dropping the write channel ends the writer task, which drops the
        // child's stdin and signals EOF.
        drop(self.write_tx);

        self.process.lock().await.stop().await;

        self.reader_handle.abort();
        self.writer_handle.abort();
        self.stderr_handle.abort();
    }

    #[cfg(test)]
    pub(crate) fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal echo-style server: replies to every request, mirroring its id.
    const MOCK_RESPONDER: &str = r#"
while IFS= read -r line; do
  case "$line" in *'"id":"'*) ;; *) continue ;; esac
  id=${line#*'"id":"'}
  id=${id%%'"'*}
  printf '{"jsonrpc":"2.0","id":"%s","result":{"ok":true}}\n' "$id"
done
"#;

    fn sh_config(script: &str) -> ServerConfig {
        ServerConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: std::collections::HashMap::new(),
        }
    }

    #[tokio::test]
    async fn spawn_and_shutdown() {
        let transport = StdioTransport::spawn(&ServerConfig::new("cat"));
        assert!(transport.is_ok());
        transport.unwrap().shutdown().await;
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_spawn_error() {
        let result = StdioTransport::spawn(&ServerConfig::new("this_command_does_not_exist_xyz123"));
        match result {
            Err(RpcError::Spawn { name, .. }) => {
                assert_eq!(name, "this_command_does_not_exist_xyz123");
            }
            Err(other) => panic!("Expected Spawn, got: {other:?}"),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[tokio::test]
    async fn request_response_roundtrip() {
        let transport = StdioTransport::spawn(&sh_config(MOCK_RESPONDER)).unwrap();

        let resp = transport
            .send_request("test/method", Some(serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(resp.result.unwrap()["ok"], true);
        assert_eq!(transport.tracker.pending_count().await, 0);

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn call_maps_remote_error() {
        let script = r#"
while IFS= read -r line; do
  case "$line" in *'"id":"'*) ;; *) continue ;; esac
  id=${line#*'"id":"'}
  id=${id%%'"'*}
  printf '{"jsonrpc":"2.0","id":"%s","error":{"message":"boom"}}\n' "$id"
done
"#;
        let transport = StdioTransport::spawn(&sh_config(script)).unwrap();

        match transport.call("tools/call", None).await {
            Err(RpcError::Remote { message, code }) => {
                assert_eq!(message, "boom");
                assert!(code.is_none());
            }
            other => panic!("Expected Remote, got: {other:?}"),
        }

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn timeout_fires_and_clears_the_table() {
        // `sleep` never writes to stdout, so the request can only time out
        let mut transport = StdioTransport::spawn(&ServerConfig {
            command: "sleep".to_string(),
            args: vec!["10".to_string()],
            env: std::collections::HashMap::new(),
        })
        .unwrap();
        transport.set_request_timeout(Duration::from_millis(100));

        let result = transport
            .send_request("test/method", Some(serde_json::json!({})))
            .await;
        match result {
            Err(RpcError::Timeout { method }) => assert_eq!(method, "test/method"),
            other => panic!("Expected Timeout, got: {other:?}"),
        }
        assert_eq!(transport.tracker.pending_count().await, 0);

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn send_after_server_exit_fails_with_transport_closed() {
        let transport = StdioTransport::spawn(&sh_config("exit 0")).unwrap();

        // Let the reader observe EOF
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(transport.is_closed());

        match transport.send_request("test/method", None).await {
            Err(RpcError::TransportClosed) => {}
            other => panic!("Expected TransportClosed, got: {other:?}"),
        }

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn pending_request_rejected_promptly_when_server_dies() {
        // Server consumes one request and exits without answering; the
        // in-flight call must fail well before the 10 s window.
        let transport = StdioTransport::spawn(&sh_config("read -r line; exit 0")).unwrap();

        let start = std::time::Instant::now();
        match transport.send_request("test/method", None).await {
            Err(RpcError::TransportClosed) => {}
            other => panic!("Expected TransportClosed, got: {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(5));

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn notification_does_not_block() {
        let transport = StdioTransport::spawn(&ServerConfig::new("cat")).unwrap();

        let result = transport
            .send_notification("notifications/initialized", None)
            .await;
        assert!(result.is_ok());

        transport.shutdown().await;
    }
}
