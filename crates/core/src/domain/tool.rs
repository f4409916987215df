use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::turn::FunctionCall;

/// Parameter schema as delivered by the tool catalog. Some servers ship the schema as a
/// JSON document embedded in a string instead of a structured object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSchema {
    Serialized(String),
    Structured(Value),
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::Structured(Value::Object(Map::new()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameter_schema: ParameterSchema,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: Option<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description,
            parameter_schema: ParameterSchema::Structured(schema),
        }
    }
}

/// Provider-facing projection of a [`ToolDescriptor`] after sanitization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One tool invocation requested by a model turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl From<&FunctionCall> for ToolCallRequest {
    fn from(call: &FunctionCall) -> Self {
        Self { name: call.name.clone(), arguments: call.args.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallOutcome {
    Payload(Value),
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub name: String,
    pub outcome: ToolCallOutcome,
}

impl ToolCallResult {
    pub fn success(name: impl Into<String>, payload: Value) -> Self {
        Self { name: name.into(), outcome: ToolCallOutcome::Payload(payload) }
    }

    pub fn failure(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), outcome: ToolCallOutcome::Error(message.into()) }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolCallOutcome::Error(_))
    }
}
