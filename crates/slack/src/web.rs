//! Slack Web API calls used by the assistant.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slackforce_core::config::SlackConfig;
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageTemplate;

pub const LOADING_MESSAGES: [&str; 3] =
    ["Spinning up Salesforce tools...", "Waking up the AI...", "Connecting to your org..."];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack request `{method}` failed: {message}")]
    Transport { method: String, message: String },
    #[error("slack method `{method}` returned error `{error}`")]
    Api { method: String, error: String },
    #[error("slack method `{method}` returned an unexpected body: {message}")]
    Decode { method: String, message: String },
}

/// One message of a thread as returned by `conversations.replies`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

impl ThreadMessage {
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.as_deref().is_some_and(|bot_id| !bot_id.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantStatus {
    pub channel_id: String,
    pub thread_ts: String,
    pub status: String,
    pub loading_messages: Vec<String>,
}

impl AssistantStatus {
    pub fn thinking(channel_id: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            thread_ts: thread_ts.into(),
            status: "thinking...".to_string(),
            loading_messages: LOADING_MESSAGES.iter().map(|message| message.to_string()).collect(),
        }
    }
}

/// Destination of a streamed answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamTarget {
    pub channel_id: String,
    pub thread_ts: String,
    pub recipient_team_id: Option<String>,
    pub recipient_user_id: Option<String>,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn conversation_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, SlackApiError>;

    async fn set_assistant_status(&self, status: &AssistantStatus) -> Result<(), SlackApiError>;

    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;

    /// Starts a streamed message and returns its `ts`.
    async fn start_stream(
        &self,
        target: &StreamTarget,
        markdown_text: &str,
    ) -> Result<String, SlackApiError>;

    async fn append_stream(
        &self,
        channel_id: &str,
        ts: &str,
        markdown_text: &str,
    ) -> Result<(), SlackApiError>;

    async fn stop_stream(
        &self,
        channel_id: &str,
        ts: &str,
        markdown_text: Option<&str>,
        blocks: &[Value],
    ) -> Result<(), SlackApiError>;

    /// Requests a Socket Mode WebSocket URL with the app-level token.
    async fn open_socket_url(&self) -> Result<String, SlackApiError>;
}

pub struct SlackWebClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
    app_token: SecretString,
}

impl SlackWebClient {
    pub fn new(base_url: impl Into<String>, bot_token: SecretString, app_token: SecretString) -> Self {
        Self { http: Client::new(), base_url: base_url.into(), bot_token, app_token }
    }

    pub fn from_config(config: &SlackConfig) -> Self {
        Self::new(config.api_base_url.clone(), config.bot_token.clone(), config.app_token.clone())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url.trim_end_matches('/'))
    }

    async fn call_json(&self, method: &str, token: &SecretString, body: Value) -> Result<Value, SlackApiError> {
        debug!(event_name = "slack.web.request", method, "calling slack web api");
        let response = self
            .http
            .post(self.method_url(method))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| transport_error(method, error))?;

        read_response(method, response).await
    }

    async fn call_query(&self, method: &str, query: &[(&str, String)]) -> Result<Value, SlackApiError> {
        debug!(event_name = "slack.web.request", method, "calling slack web api");
        let response = self
            .http
            .get(self.method_url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|error| transport_error(method, error))?;

        read_response(method, response).await
    }
}

fn transport_error(method: &str, error: reqwest::Error) -> SlackApiError {
    SlackApiError::Transport { method: method.to_string(), message: error.to_string() }
}

async fn read_response(method: &str, response: reqwest::Response) -> Result<Value, SlackApiError> {
    let body: Value = response.json().await.map_err(|error| SlackApiError::Decode {
        method: method.to_string(),
        message: error.to_string(),
    })?;
    check_ok(method, body)
}

/// Slack reports failures as `{"ok": false, "error": "..."}` with a 200 status.
pub fn check_ok(method: &str, body: Value) -> Result<Value, SlackApiError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }

    let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_string();
    Err(SlackApiError::Api { method: method.to_string(), error })
}

fn string_field(method: &str, body: &Value, field: &str) -> Result<String, SlackApiError> {
    body.get(field).and_then(Value::as_str).map(str::to_owned).ok_or_else(|| SlackApiError::Decode {
        method: method.to_string(),
        message: format!("missing `{field}`"),
    })
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn conversation_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, SlackApiError> {
        let method = "conversations.replies";
        let body = self
            .call_query(
                method,
                &[
                    ("channel", channel_id.to_string()),
                    ("ts", thread_ts.to_string()),
                    ("inclusive", "true".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let messages = body.get("messages").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
        serde_json::from_value(messages).map_err(|error| SlackApiError::Decode {
            method: method.to_string(),
            message: error.to_string(),
        })
    }

    async fn set_assistant_status(&self, status: &AssistantStatus) -> Result<(), SlackApiError> {
        self.call_json(
            "assistant.threads.setStatus",
            &self.bot_token,
            json!({
                "channel_id": status.channel_id,
                "thread_ts": status.thread_ts,
                "status": status.status,
                "loading_messages": status.loading_messages,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let mut body = json!({
            "channel": channel_id,
            "text": message.fallback_text,
            "blocks": message.block_values(),
        });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = Value::String(thread_ts.to_string());
        }

        self.call_json("chat.postMessage", &self.bot_token, body).await.map(|_| ())
    }

    async fn start_stream(
        &self,
        target: &StreamTarget,
        markdown_text: &str,
    ) -> Result<String, SlackApiError> {
        let method = "chat.startStream";
        let mut body = json!({
            "channel": target.channel_id,
            "thread_ts": target.thread_ts,
        });
        if let Some(team_id) = &target.recipient_team_id {
            body["recipient_team_id"] = Value::String(team_id.clone());
        }
        if let Some(user_id) = &target.recipient_user_id {
            body["recipient_user_id"] = Value::String(user_id.clone());
        }
        if !markdown_text.is_empty() {
            body["markdown_text"] = Value::String(markdown_text.to_string());
        }

        let response = self.call_json(method, &self.bot_token, body).await?;
        string_field(method, &response, "ts")
    }

    async fn append_stream(
        &self,
        channel_id: &str,
        ts: &str,
        markdown_text: &str,
    ) -> Result<(), SlackApiError> {
        self.call_json(
            "chat.appendStream",
            &self.bot_token,
            json!({"channel": channel_id, "ts": ts, "markdown_text": markdown_text}),
        )
        .await
        .map(|_| ())
    }

    async fn stop_stream(
        &self,
        channel_id: &str,
        ts: &str,
        markdown_text: Option<&str>,
        blocks: &[Value],
    ) -> Result<(), SlackApiError> {
        let mut body = json!({"channel": channel_id, "ts": ts});
        if let Some(markdown_text) = markdown_text.filter(|text| !text.is_empty()) {
            body["markdown_text"] = Value::String(markdown_text.to_string());
        }
        if !blocks.is_empty() {
            body["blocks"] = Value::Array(blocks.to_vec());
        }

        self.call_json("chat.stopStream", &self.bot_token, body).await.map(|_| ())
    }

    async fn open_socket_url(&self) -> Result<String, SlackApiError> {
        let method = "apps.connections.open";
        let response = self.call_json(method, &self.app_token, json!({})).await?;
        string_field(method, &response, "url")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{check_ok, AssistantStatus, SlackApiError, SlackWebClient, ThreadMessage};

    #[test]
    fn ok_false_becomes_api_error() {
        let error = check_ok("chat.startStream", json!({"ok": false, "error": "not_in_channel"}))
            .expect_err("api error");
        assert_eq!(
            error,
            SlackApiError::Api { method: "chat.startStream".into(), error: "not_in_channel".into() }
        );
    }

    #[test]
    fn thread_messages_decode_with_optional_bot_id() {
        let messages: Vec<ThreadMessage> = serde_json::from_value(json!([
            {"type": "message", "user": "U1", "text": "hi", "ts": "1.0"},
            {"type": "message", "bot_id": "B1", "text": "hello!", "ts": "2.0"}
        ]))
        .expect("decode");

        assert!(!messages[0].is_from_bot());
        assert!(messages[1].is_from_bot());
    }

    #[test]
    fn thinking_status_lists_loading_messages() {
        let status = AssistantStatus::thinking("D1", "1.0");
        assert_eq!(status.status, "thinking...");
        assert_eq!(status.loading_messages.len(), 3);
        assert_eq!(status.loading_messages[0], "Spinning up Salesforce tools...");
    }

    #[test]
    fn method_url_joins_base_and_method() {
        let client = SlackWebClient::new(
            "https://slack.com/api/",
            "xoxb-test".to_string().into(),
            "xapp-test".to_string().into(),
        );
        assert_eq!(client.method_url("chat.postMessage"), "https://slack.com/api/chat.postMessage");
    }
}
