use async_trait::async_trait;
use serde::Serialize;
use slackforce_core::{FunctionDeclaration, Turn};
use thiserror::Error;

/// Tool set bound to every generation call of one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ToolConfig {
    pub function_declarations: Vec<FunctionDeclaration>,
}

impl ToolConfig {
    /// Returns `None` for an empty catalog; Gemini rejects an empty declaration list.
    pub fn from_declarations(function_declarations: Vec<FunctionDeclaration>) -> Option<Self> {
        (!function_declarations.is_empty()).then_some(Self { function_declarations })
    }

    pub fn len(&self) -> usize {
        self.function_declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.function_declarations.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub system_prompt: Option<&'a str>,
    pub turns: &'a [Turn],
    pub tools: Option<&'a ToolConfig>,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model request failed: {0}")]
    Transport(String),
    #[error("model provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model response could not be decoded: {0}")]
    Decode(String),
    #[error("model returned no candidates")]
    EmptyResponse,
    #[error("model call exceeded its {0}s deadline")]
    Timeout(u64),
}

/// One stateless generation call: the full dialogue goes in, one model turn comes out.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Turn, GenerationError>;
}
