use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use slackforce_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    // Slack tokens are shown redacted, so a missing one should not hide the rest.
    let config = match AppConfig::load(LoadOptions { skip_slack: true, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let entries = vec![
        entry(
            "slack.app_token",
            redact_token(config.slack.app_token.expose_secret()),
            &["SLACKFORCE_SLACK_APP_TOKEN"],
        ),
        entry(
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            &["SLACKFORCE_SLACK_BOT_TOKEN"],
        ),
        entry("slack.api_base_url", config.slack.api_base_url.clone(), &["SLACKFORCE_SLACK_API_BASE_URL"]),
        entry(
            "slack.history_limit",
            config.slack.history_limit.to_string(),
            &["SLACKFORCE_SLACK_HISTORY_LIMIT"],
        ),
        entry(
            "slack.stream_buffer_size",
            config.slack.stream_buffer_size.to_string(),
            &["SLACKFORCE_SLACK_STREAM_BUFFER_SIZE"],
        ),
        entry("llm.api_key", llm_api_key.to_string(), &["SLACKFORCE_LLM_API_KEY", "GOOGLE_API_KEY"]),
        entry("llm.base_url", config.llm.base_url.clone(), &["SLACKFORCE_LLM_BASE_URL"]),
        entry("llm.model", config.llm.model.clone(), &["SLACKFORCE_LLM_MODEL"]),
        entry("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["SLACKFORCE_LLM_TIMEOUT_SECS"]),
        entry(
            "llm.system_prompt",
            if config.llm.system_prompt.is_some() { "<set>" } else { "<unset>" }.to_string(),
            &[],
        ),
        entry("mcp.command", config.mcp.command.clone(), &["SLACKFORCE_MCP_COMMAND"]),
        entry("mcp.args", config.mcp.args.join(" "), &["SLACKFORCE_MCP_ARGS"]),
        entry(
            "mcp.env",
            config.mcp.env.keys().map(String::as_str).collect::<Vec<_>>().join(","),
            &[],
        ),
        entry(
            "mcp.tool_timeout_secs",
            config.mcp.tool_timeout_secs.to_string(),
            &["SLACKFORCE_MCP_TOOL_TIMEOUT_SECS"],
        ),
        entry(
            "agent.max_tool_rounds",
            config.agent.max_tool_rounds.to_string(),
            &["SLACKFORCE_AGENT_MAX_TOOL_ROUNDS"],
        ),
        entry(
            "agent.tool_failure_policy",
            format!("{:?}", config.agent.tool_failure_policy),
            &["SLACKFORCE_AGENT_TOOL_FAILURE_POLICY"],
        ),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["SLACKFORCE_SERVER_BIND_ADDRESS"],
        ),
        entry(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["SLACKFORCE_SERVER_HEALTH_CHECK_PORT"],
        ),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["SLACKFORCE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["SLACKFORCE_LOGGING_LEVEL", "SLACKFORCE_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["SLACKFORCE_LOGGING_FORMAT", "SLACKFORCE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .into_iter()
            .map(|entry| render_line(entry.key, &entry.value, source(entry.key, entry.env_keys))),
    );
    lines.join("\n")
}

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value, env_keys }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("slackforce.toml"), PathBuf::from("config/slackforce.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("xoxb-123-456"), "xoxb-***");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
    }

    #[test]
    fn dotted_paths_resolve_into_tables() {
        let doc: toml::Value = "[mcp]\ncommand = \"uv\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "mcp.command"));
        assert!(!contains_path(&doc, "mcp.args"));
        assert!(!contains_path(&doc, "llm.model"));
    }
}
