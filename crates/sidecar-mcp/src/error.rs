//! Error types for tool-server communication.

use thiserror::Error;

/// Errors from tool-server communication.
///
/// Only [`RpcError::Spawn`] during [`Client::connect`](crate::Client::connect)
/// is fatal to the client as a whole; every other kind is scoped to the call
/// that produced it. Unparseable lines on the wire are not represented here
/// at all — the framer logs and skips them.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Failed to spawn tool server '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("Tool server exited or closed its pipes")]
    TransportClosed,

    #[error("Request '{method}' timed out")]
    Timeout { method: String },

    #[error("Tool server error: {message}")]
    Remote {
        message: String,
        code: Option<i64>,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
