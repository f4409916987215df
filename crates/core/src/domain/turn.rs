use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn function_call(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self::FunctionCall(FunctionCall { name: name.into(), args })
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self::FunctionResponse(FunctionResponse { name: name.into(), response })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::FunctionCall(call) => Some(call),
            _ => None,
        }
    }
}

/// One role-tagged unit of dialogue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
    /// The provider's own encoding of a generated turn, including reasoning metadata
    /// that `parts` does not model. Sent back verbatim when the turn is replayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_content: Option<Value>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts, provider_content: None }
    }

    pub fn with_provider_content(mut self, content: Value) -> Self {
        self.provider_content = Some(content);
        self
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(Part::as_function_call)
    }

    pub fn has_function_calls(&self) -> bool {
        self.function_calls().next().is_some()
    }

    /// Concatenation of every text part, in order.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    pub fn is_function_response_turn(&self) -> bool {
        self.role == Role::User
            && !self.parts.is_empty()
            && self.parts.iter().all(|part| matches!(part, Part::FunctionResponse(_)))
    }
}
