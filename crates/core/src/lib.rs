//! Shared building blocks for the slackforce workspace: layered configuration, the
//! conversation domain model exchanged between Slack, Gemini and MCP, and the
//! streaming sink contract used to deliver answers back to a chat surface.

pub mod config;
pub mod domain;
pub mod errors;
pub mod stream;

pub use domain::conversation::ConversationState;
pub use domain::tool::{
    FunctionDeclaration, ParameterSchema, ToolCallOutcome, ToolCallRequest, ToolCallResult,
    ToolDescriptor,
};
pub use domain::turn::{FunctionCall, FunctionResponse, Part, Role, Turn};
pub use errors::DomainError;
pub use stream::{MemorySink, SinkError, StreamSink};
