//! Stdio JSON-RPC client for sidecar tool-server processes.
//!
//! Spawns a tool server as a child process and speaks newline-delimited
//! JSON-RPC 2.0 with it over stdin/stdout (the MCP stdio profile). The
//! client performs the initialize handshake, discovers the server's tools,
//! and invokes them; the server's stderr is captured as diagnostic log
//! output and never parsed as protocol data.

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;

mod correlator;
mod framer;
mod process;
mod transport;

pub use client::{Client, ServerInfo, ToolContent, ToolInfo, ToolOutput};
pub use config::ServerConfig;
pub use error::RpcError;
