use async_trait::async_trait;
use serde_json::{Map, Value};
use slackforce_core::ToolDescriptor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolProtocolError {
    #[error("could not start tool session: {0}")]
    Connect(String),
    #[error("tool session transport failed: {0}")]
    Transport(String),
    #[error("tool `{name}` reported an error: {message}")]
    ToolFailed { name: String, message: String },
    #[error("tool `{name}` exceeded its {timeout_secs}s deadline")]
    Timeout { name: String, timeout_secs: u64 },
    #[error("tool session is closed")]
    Closed,
}

/// A live connection to one tool-execution process.
///
/// Owned by exactly one run. `close` must be called before the session is dropped;
/// later calls on a closed session fail with [`ToolProtocolError::Closed`].
#[async_trait]
pub trait ToolSession: Send {
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, ToolProtocolError>;

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ToolProtocolError>;

    async fn close(&mut self) -> Result<(), ToolProtocolError>;
}

/// Opens a fresh session per run; sessions are never pooled.
#[async_trait]
pub trait ToolSessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ToolSession>, ToolProtocolError>;
}

/// Wraps a raw tool output the way the model expects to read it back.
pub fn result_payload(output: Value) -> Value {
    let mut payload = Map::new();
    payload.insert("result".to_string(), output);
    Value::Object(payload)
}

pub fn error_payload(message: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("error".to_string(), Value::String(message.to_string()));
    Value::Object(payload)
}
