//! Launch configuration for a tool-server process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for spawning a tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Command to run (e.g., "npx", "python").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overlay for the server process. Credentials and
    /// protocol-version variables travel here.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    /// Config for a bare command with no arguments or environment overlay.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }
}
