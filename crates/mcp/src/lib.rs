//! Slackforce MCP (Model Context Protocol) client
//!
//! Spawns the configured tool server as a child process, speaks MCP over its
//! stdio, and exposes it to the agent as a [`slackforce_agent::ToolSession`].
//!
//! ## Architecture
//!
//! - `McpSessionFactory`: spawns one server process per agent run
//! - `McpToolSession`: a connected session; closing it shuts the process down
//! - `convert`: maps rmcp tool listings and call results onto slackforce types

mod client;
pub mod convert;

pub use client::{McpSessionFactory, McpToolSession};

use std::path::PathBuf;

use slackforce_agent::ToolProtocolError;
use thiserror::Error;

/// Errors specific to MCP client operations
#[derive(Error, Debug)]
pub enum McpClientError {
    #[error("mcp command `{command}` was not found on PATH")]
    CommandNotFound { command: String },

    #[error("failed to spawn mcp server `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("mcp handshake failed: {0}")]
    Handshake(String),

    #[error("mcp request failed: {0}")]
    Request(String),

    #[error("tool `{name}` returned an error: {message}")]
    ToolError { name: String, message: String },
}

impl From<McpClientError> for ToolProtocolError {
    fn from(error: McpClientError) -> Self {
        match error {
            McpClientError::CommandNotFound { .. }
            | McpClientError::Spawn { .. }
            | McpClientError::Handshake(_) => ToolProtocolError::Connect(error.to_string()),
            McpClientError::Request(message) => ToolProtocolError::Transport(message),
            McpClientError::ToolError { name, message } => {
                ToolProtocolError::ToolFailed { name, message }
            }
        }
    }
}

/// Resolves the server command the way the child process spawn will.
pub fn resolve_command(command: &str) -> Result<PathBuf, McpClientError> {
    which::which(command)
        .map_err(|_| McpClientError::CommandNotFound { command: command.to_string() })
}
