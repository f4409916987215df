use std::borrow::Cow;
use std::collections::BTreeMap;

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::{RoleClient, RunningService, ServiceExt as _};
use rmcp::transport::TokioChildProcess;
use serde_json::{Map, Value};
use slackforce_agent::{ToolProtocolError, ToolSession, ToolSessionFactory};
use slackforce_core::config::McpConfig;
use slackforce_core::ToolDescriptor;
use tracing::{debug, info};

use crate::convert::{call_output, tool_descriptor};
use crate::McpClientError;

/// Spawns a fresh MCP server process for every session it opens.
#[derive(Clone, Debug)]
pub struct McpSessionFactory {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl McpSessionFactory {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self { command: command.into(), args, env: BTreeMap::new() }
    }

    pub fn from_config(config: &McpConfig) -> Self {
        Self { command: config.command.clone(), args: config.args.clone(), env: config.env.clone() }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub async fn connect(&self) -> Result<McpToolSession, McpClientError> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let transport = TokioChildProcess::new(cmd).map_err(|error| McpClientError::Spawn {
            command: self.command.clone(),
            message: error.to_string(),
        })?;

        let service =
            ().serve(transport).await.map_err(|error| McpClientError::Handshake(error.to_string()))?;

        info!(
            event_name = "tools.mcp.connected",
            command = %self.command,
            "connected to mcp server"
        );

        Ok(McpToolSession { service: Some(service) })
    }
}

#[async_trait]
impl ToolSessionFactory for McpSessionFactory {
    async fn open(&self) -> Result<Box<dyn ToolSession>, ToolProtocolError> {
        let session = self.connect().await?;
        Ok(Box::new(session))
    }
}

/// One connected MCP server process. `close` shuts the process down.
pub struct McpToolSession {
    service: Option<RunningService<RoleClient, ()>>,
}

impl McpToolSession {
    fn service(&self) -> Result<&RunningService<RoleClient, ()>, ToolProtocolError> {
        self.service.as_ref().ok_or(ToolProtocolError::Closed)
    }
}

#[async_trait]
impl ToolSession for McpToolSession {
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, ToolProtocolError> {
        let tools = self
            .service()?
            .list_all_tools()
            .await
            .map_err(|error| McpClientError::Request(format!("list_tools failed: {error}")))?;

        debug!(event_name = "tools.mcp.listed", tools = tools.len(), "listed mcp tools");
        Ok(tools.iter().map(tool_descriptor).collect())
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ToolProtocolError> {
        let result = self
            .service()?
            .call_tool(CallToolRequestParam {
                name: Cow::Owned(name.to_string()),
                arguments: Some(arguments),
            })
            .await
            .map_err(|error| McpClientError::Request(format!("call_tool `{name}` failed: {error}")))?;

        Ok(call_output(name, &result)?)
    }

    async fn close(&mut self) -> Result<(), ToolProtocolError> {
        let Some(service) = self.service.take() else {
            return Ok(());
        };

        service
            .cancel()
            .await
            .map_err(|error| ToolProtocolError::Transport(format!("shutdown failed: {error}")))?;
        debug!(event_name = "tools.mcp.closed", "mcp session closed");
        Ok(())
    }
}
