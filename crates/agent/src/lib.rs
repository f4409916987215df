//! Agent runtime: the Gemini tool-calling loop over an MCP tool session.
//!
//! A run builds function declarations from the tool catalog (`catalog`, `schema`),
//! seeds the conversation from the chat thread (`conversation`), then alternates
//! generation calls (`llm`, `gemini`) and sequential tool calls (`tools`) until the
//! model answers without requesting tools. Round caps and deadlines live in
//! `guardrails`; `runtime` ties it together and owns the failure boundary.

pub mod catalog;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod guardrails;
pub mod llm;
pub mod runtime;
pub mod schema;
pub mod stream;
pub mod tools;

pub use catalog::{build_declarations, build_tool_config, CatalogError};
pub use conversation::{hydrate_thread, Author, HydratedThread, PriorMessage};
pub use error::AgentError;
pub use gemini::GeminiClient;
pub use guardrails::LoopGuardrails;
pub use llm::{GenerationError, GenerationRequest, ModelClient, ToolConfig};
pub use runtime::{AgentRuntime, AgentSettings, ConversationTrigger, RunRequest, RunSummary};
pub use schema::sanitize_schema;
pub use tools::{ToolProtocolError, ToolSession, ToolSessionFactory};
