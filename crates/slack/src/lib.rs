//! Slack surface for slackforce.
//!
//! - **Socket Mode** (`socket`) - WebSocket event loop with ack and reconnect handling
//! - **Events** (`events`) - Typed envelopes and the handler dispatcher for DMs, mentions
//!   and feedback buttons
//! - **Web API** (`web`) - Thread history, assistant status, messages and chat streams
//! - **Streaming** (`stream`) - Buffered `StreamSink` over `chat.*Stream`
//! - **Block Kit** (`blocks`) - Feedback and error message builders
//!
//! ```text
//! Socket Mode → EventDispatcher → ConversationService → agent run
//!                                        ↓
//!                 SlackChatStream ← streamed answer + feedback block
//! ```

pub mod blocks;
pub mod events;
pub mod socket;
pub mod stream;
pub mod web;
