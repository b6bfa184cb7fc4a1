//! Incremental framer for the server's output stream.
//!
//! The server writes one JSON object per line, but reads come back in
//! arbitrary chunks: a chunk may hold zero, one, or many complete messages,
//! and may cut a message anywhere. The framer buffers the unterminated tail
//! across chunks and only yields complete lines.

use crate::jsonrpc::RpcResponse;

/// Splits raw output bytes into parsed response envelopes.
pub(crate) struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed a chunk of bytes and return any complete envelopes.
    ///
    /// Lines that do not start with `{` are diagnostic noise and are logged
    /// and dropped; lines that fail to parse are logged and skipped. Neither
    /// stops the stream.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<RpcResponse> {
        self.buf.extend_from_slice(chunk);
        let mut envelopes = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos]);
            let line = line.trim();

            if line.is_empty() {
                continue;
            }
            if !line.starts_with('{') {
                tracing::debug!("server output (non-protocol): {line}");
                continue;
            }
            match serde_json::from_str::<RpcResponse>(line) {
                Ok(resp) => envelopes.push(resp),
                Err(e) => tracing::warn!("Skipping malformed message: {e}: {line}"),
            }
        }

        envelopes
    }
}
