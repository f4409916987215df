//! Gemini `generateContent` client and its wire types.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use slackforce_core::config::LlmConfig;
use slackforce_core::{FunctionCall, FunctionDeclaration, FunctionResponse, Part, Role, Turn};
use tracing::{debug, warn};

use crate::llm::{GenerationError, GenerationRequest, ModelClient, ToolConfig};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// Gemini parts are objects with exactly one payload field, but responses can also
/// carry metadata such as `thought` or `thoughtSignature` next to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl From<&Turn> for GeminiContent {
    fn from(turn: &Turn) -> Self {
        if let Some(raw) = &turn.provider_content {
            match serde_json::from_value::<GeminiContent>(raw.clone()) {
                Ok(mut content) => {
                    content.role = Some(turn.role.as_str().to_string());
                    return content;
                }
                Err(error) => warn!(
                    event_name = "agent.gemini.replay_fallback",
                    error = %error,
                    "stored model content is not gemini content; re-encoding parts"
                ),
            }
        }

        Self {
            role: Some(turn.role.as_str().to_string()),
            parts: turn.parts.iter().map(GeminiPart::from).collect(),
        }
    }
}

impl From<&Part> for GeminiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self { text: Some(text.clone()), ..Self::default() },
            Part::FunctionCall(call) => Self {
                function_call: Some(GeminiFunctionCall {
                    name: call.name.clone(),
                    args: Some(Value::Object(call.args.clone())),
                }),
                ..Self::default()
            },
            Part::FunctionResponse(response) => Self {
                function_response: Some(GeminiFunctionResponse {
                    name: response.name.clone(),
                    response: response.response.clone(),
                }),
                ..Self::default()
            },
        }
    }
}

impl GeminiPart {
    /// Converts a response part. Thought summaries and empty parts have no domain
    /// counterpart; they survive only in the turn's provider content.
    fn into_part(self) -> Option<Part> {
        if let Some(call) = self.function_call {
            let args = match call.args {
                Some(Value::Object(map)) => map,
                Some(Value::Null) | None => Map::new(),
                Some(other) => {
                    let mut wrapped = Map::new();
                    wrapped.insert("value".to_string(), other);
                    wrapped
                }
            };
            return Some(Part::FunctionCall(FunctionCall { name: call.name, args }));
        }
        if let Some(response) = self.function_response {
            return Some(Part::FunctionResponse(FunctionResponse {
                name: response.name,
                response: response.response,
            }));
        }
        if self.thought == Some(true) {
            return None;
        }
        self.text.map(Part::Text)
    }
}

impl GeminiRequest {
    pub fn from_generation(request: &GenerationRequest<'_>) -> Self {
        Self {
            contents: request.turns.iter().map(GeminiContent::from).collect(),
            system_instruction: request.system_prompt.map(|prompt| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: Some(prompt.to_string()), ..GeminiPart::default() }],
            }),
            tools: request.tools.map(|tools: &ToolConfig| {
                vec![GeminiTool { function_declarations: tools.function_declarations.clone() }]
            }),
        }
    }
}

impl GeminiResponse {
    /// Takes the first candidate as the model turn.
    pub fn into_turn(self) -> Result<Turn, GenerationError> {
        let candidate = self.candidates.into_iter().next().ok_or(GenerationError::EmptyResponse)?;
        let finish_reason = candidate.finish_reason;
        let raw = candidate.content.as_ref().and_then(|content| serde_json::to_value(content).ok());
        let parts: Vec<Part> = candidate
            .content
            .map(|content| content.parts.into_iter().filter_map(GeminiPart::into_part).collect())
            .unwrap_or_default();

        if parts.is_empty() {
            return Err(GenerationError::Decode(format!(
                "candidate has no content (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let turn = Turn::new(Role::Model, parts);
        Ok(match raw {
            Some(raw) => turn.with_provider_content(raw),
            None => turn,
        })
    }
}

pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self { http: Client::new(), base_url: base_url.into(), api_key }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GenerationError::Transport("llm.api_key is not configured".to_string())
        })?;
        Ok(Self::new(config.base_url.clone(), api_key))
    }

    fn generate_url(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/models/{model}:generateContent")
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Turn, GenerationError> {
        let wire_request = GeminiRequest::from_generation(&request);
        let url = self.generate_url(request.model);

        debug!(
            event_name = "agent.gemini.request",
            model = request.model,
            turns = request.turns.len(),
            tools = request.tools.map(ToolConfig::len).unwrap_or(0),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&wire_request)
            .send()
            .await
            .map_err(|error| GenerationError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "agent.gemini.error_status",
                model = request.model,
                status = status.as_u16(),
                "gemini returned an error status"
            );
            return Err(GenerationError::Status { status: status.as_u16(), body });
        }

        let wire_response: GeminiResponse = response
            .json()
            .await
            .map_err(|error| GenerationError::Decode(error.to_string()))?;

        wire_response.into_turn()
    }
}
