//! Tool-server client: handshake, discovery, invocation.
//!
//! Performs the protocol handshake (initialize + initialized notification),
//! reports the server's identity, lists its tools (tools/list), and invokes
//! them (tools/call).

use crate::config::ServerConfig;
use crate::error::RpcError;
use crate::transport::StdioTransport;
use serde::Deserialize;

/// Protocol version we speak.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Identity the server reports during the handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// A tool exposed by the server.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Result of invoking a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
}

/// A content item in a tool result.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// Deserialization helpers for protocol result shapes.
#[derive(Deserialize)]
struct InitializeResult {
    #[serde(rename = "serverInfo")]
    server_info: ServerInfo,
}

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_schema", rename = "inputSchema")]
    input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Deserialize)]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<ToolContent>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

/// Client for one tool-server process.
///
/// An explicit owned value: construct with [`Client::connect`], tear down
/// with [`Client::shutdown`]. If the server exits underneath us, pending and
/// subsequent calls fail with [`RpcError::TransportClosed`] and
/// [`Client::is_connected`] turns false; callers recover by connecting a
/// fresh client.
pub struct Client {
    transport: StdioTransport,
    server_info: ServerInfo,
}

impl Client {
    /// Spawn the server and perform the initialize handshake.
    ///
    /// A server that cannot report its identity is not usable, so any
    /// failure in the handshake fails the whole connection.
    pub async fn connect(config: &ServerConfig) -> Result<Self, RpcError> {
        let transport = StdioTransport::spawn(config)?;

        let init_params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let result = transport.call("initialize", Some(init_params)).await?;
        let init: InitializeResult = serde_json::from_value(result).map_err(|e| {
            RpcError::Protocol(format!("Failed to parse initialize response: {e}"))
        })?;

        transport
            .send_notification("notifications/initialized", None)
            .await?;

        tracing::info!(
            "Connected to tool server '{}' v{}",
            init.server_info.name,
            init.server_info.version
        );

        Ok(Self {
            transport,
            server_info: init.server_info,
        })
    }

    /// Identity the server reported during the handshake.
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// List the tools the server currently exposes.
    ///
    /// Discovery is best-effort: any failure — transport, timeout, remote
    /// error, unparseable result — degrades to an empty list instead of
    /// propagating, unlike [`Client::invoke`]. Don't use this as a liveness
    /// probe; check [`Client::is_connected`] instead.
    pub async fn list_tools(&self) -> Vec<ToolInfo> {
        let result = match self.transport.call("tools/list", None).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("tools/list failed: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_value::<ToolsListResult>(result) {
            Ok(list) => list
                .tools
                .into_iter()
                .map(|t| ToolInfo {
                    name: t.name,
                    description: t.description,
                    input_schema: t.input_schema,
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to parse tools/list response: {e}");
                Vec::new()
            }
        }
    }

    /// Invoke a named tool.
    ///
    /// Arguments are passed through as-is; matching the tool's declared
    /// input schema is the caller's job. A failure the server reports for
    /// this call comes back as [`RpcError::Remote`] with the server's
    /// message verbatim.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, RpcError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let result = self.transport.call("tools/call", Some(params)).await?;

        let call_result: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| RpcError::Protocol(format!("Failed to parse tools/call result: {e}")))?;

        Ok(ToolOutput {
            content: call_result.content,
            is_error: call_result.is_error,
        })
    }

    /// Whether the server process is still reachable.
    pub fn is_connected(&self) -> bool {
        !self.transport.is_closed()
    }

    /// Tear down the connection and stop the server process.
    ///
    /// The reason is recorded in the log only. In-flight requests are not
    /// rejected here; they fail with [`RpcError::TransportClosed`] once the
    /// server's output stream closes.
    pub async fn shutdown(self, reason: &str) {
        tracing::info!(
            "Shutting down connection to '{}': {reason}",
            self.server_info.name
        );
        self.transport.shutdown().await;
    }
}
