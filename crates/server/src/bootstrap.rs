use std::sync::Arc;

use slackforce_agent::{AgentRuntime, AgentSettings, GeminiClient, GenerationError};
use slackforce_core::config::{AppConfig, ConfigError, LoadOptions};
use slackforce_mcp::{resolve_command, McpSessionFactory};
use slackforce_slack::{
    events::assistant_dispatcher,
    socket::{ReconnectPolicy, SlackSocketTransport, SocketModeRunner},
    web::{SlackApi, SlackWebClient},
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assistant::SlackAssistant;

pub struct Application {
    pub config: AppConfig,
    pub agent_runtime: Arc<AgentRuntime>,
    pub slack_runner: SocketModeRunner,
    pub shutdown: CancellationToken,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model client setup failed: {0}")]
    ModelClient(#[source] GenerationError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        "starting application bootstrap"
    );

    let model = GeminiClient::from_config(&config.llm).map_err(BootstrapError::ModelClient)?;
    let tools = McpSessionFactory::from_config(&config.mcp);
    match resolve_command(tools.command()) {
        Ok(path) => info!(
            event_name = "system.bootstrap.tool_server_resolved",
            correlation_id = "bootstrap",
            command = %path.display(),
            "tool server command resolved"
        ),
        // The tool server may be installed after startup; runs report the failure instead.
        Err(error) => warn!(
            event_name = "system.bootstrap.tool_server_missing",
            correlation_id = "bootstrap",
            error = %error,
            "tool server command not found"
        ),
    }

    let agent_runtime = Arc::new(AgentRuntime::new(
        Arc::new(model),
        Arc::new(tools),
        AgentSettings::from_config(&config),
    ));

    let slack_api: Arc<dyn SlackApi> = Arc::new(SlackWebClient::from_config(&config.slack));
    let shutdown = CancellationToken::new();
    let assistant = Arc::new(SlackAssistant::new(
        Arc::clone(&slack_api),
        Arc::clone(&agent_runtime),
        config.slack.history_limit,
        config.slack.stream_buffer_size,
        shutdown.clone(),
    ));
    let slack_runner = SocketModeRunner::new(
        Arc::new(SlackSocketTransport::new(slack_api)),
        assistant_dispatcher(assistant),
        ReconnectPolicy::default(),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        max_tool_rounds = config.agent.max_tool_rounds,
        "application wired"
    );

    Ok(Application { config, agent_runtime, slack_runner, shutdown })
}

#[cfg(test)]
mod tests {
    use slackforce_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides(app_token: &str, api_key: Option<&str>) -> LoadOptions {
        LoadOptions {
            config_path: Some("slackforce-test-missing.toml".into()),
            overrides: ConfigOverrides {
                slack_app_token: Some(app_token.to_string()),
                slack_bot_token: Some("xoxb-test".to_string()),
                llm_api_key: api_key.map(str::to_string),
                mcp_command: Some("sh".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(overrides("invalid-token", Some("test-key")));

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[test]
    fn bootstrap_wires_runtime_from_config() {
        let app = bootstrap(overrides("xapp-test", Some("test-key"))).expect("bootstrap");

        assert_eq!(app.agent_runtime.settings().model, app.config.llm.model);
        assert_eq!(
            app.agent_runtime.settings().guardrails.max_tool_rounds,
            app.config.agent.max_tool_rounds
        );
        assert!(!app.shutdown.is_cancelled());
    }
}
