use serde::Serialize;
use slackforce_agent::{build_declarations, ToolSessionFactory};
use slackforce_core::config::{AppConfig, LoadOptions};
use slackforce_core::FunctionDeclaration;
use slackforce_mcp::McpSessionFactory;
use tracing::warn;

use super::{block_on, CommandResult};

#[derive(Debug, Serialize)]
struct ToolsReport {
    command: &'static str,
    status: &'static str,
    tool_count: usize,
    declarations: Vec<FunctionDeclaration>,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions { skip_slack: true, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("tools", "config_validation", error.to_string(), 2)
        }
    };

    super::init_logging(&config);
    let factory = McpSessionFactory::from_config(&config.mcp);
    match block_on(describe(&factory)) {
        Ok(result) => result,
        Err(error) => CommandResult::failure("tools", "runtime", error.to_string(), 1),
    }
}

/// Lists the catalog once and prints the declarations the model would receive.
pub async fn describe(factory: &dyn ToolSessionFactory) -> CommandResult {
    let mut session = match factory.open().await {
        Ok(session) => session,
        Err(error) => return CommandResult::failure("tools", "tool_server", error.to_string(), 3),
    };

    let listing = session.list_tools().await;
    // Close before reporting so the child process never outlives the command.
    if let Err(error) = session.close().await {
        warn!(
            event_name = "cli.tools.close_failed",
            error = %error,
            "failed to close tool session"
        );
    }

    let descriptors = match listing {
        Ok(descriptors) => descriptors,
        Err(error) => return CommandResult::failure("tools", "tool_server", error.to_string(), 3),
    };
    let declarations = match build_declarations(&descriptors) {
        Ok(declarations) => declarations,
        Err(error) => return CommandResult::failure("tools", "catalog", error.to_string(), 3),
    };

    let report = ToolsReport {
        command: "tools",
        status: "ok",
        tool_count: declarations.len(),
        declarations,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("tools", "serialization", error.to_string(), 1),
    }
}
