use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::blocks::{FEEDBACK_ACTION_ID, NEGATIVE_FEEDBACK_VALUE, POSITIVE_FEEDBACK_VALUE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    DirectMessage(ConversationEvent),
    AppMention(ConversationEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::DirectMessage(_) => SlackEventType::DirectMessage,
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn thread_ts(&self) -> Option<&str> {
        match self {
            Self::DirectMessage(event) | Self::AppMention(event) => Some(&event.thread_ts),
            Self::BlockAction(event) => event.thread_ts.as_deref(),
            Self::Unsupported { .. } => None,
        }
    }

    /// Builds a typed event from a Socket Mode envelope's `type` and `payload`.
    pub fn from_socket_payload(envelope_type: &str, payload: &Value) -> Self {
        match envelope_type {
            "events_api" => Self::from_events_api(payload),
            "interactive" => Self::from_interactive(payload),
            other => Self::Unsupported { event_type: other.to_owned() },
        }
    }

    fn from_events_api(payload: &Value) -> Self {
        let event = payload.get("event").unwrap_or(&Value::Null);
        let event_type = str_at(event, "type").unwrap_or("unknown");
        let team_id = str_at(event, "team").or_else(|| str_at(payload, "team_id"));

        match event_type {
            "message" => {
                // Bot messages and edits/joins carry bot_id or a subtype; answering them would loop.
                let is_direct = str_at(event, "channel_type") == Some("im");
                if !is_direct || event.get("bot_id").is_some() || event.get("subtype").is_some() {
                    return Self::Unsupported { event_type: "message.ignored".to_owned() };
                }
                ConversationEvent::from_event(event, team_id)
                    .map(Self::DirectMessage)
                    .unwrap_or_else(|| Self::Unsupported { event_type: "message.malformed".to_owned() })
            }
            "app_mention" => {
                if event.get("bot_id").is_some() {
                    return Self::Unsupported { event_type: "app_mention.ignored".to_owned() };
                }
                ConversationEvent::from_event(event, team_id)
                    .map(Self::AppMention)
                    .unwrap_or_else(|| Self::Unsupported {
                        event_type: "app_mention.malformed".to_owned(),
                    })
            }
            other => Self::Unsupported { event_type: other.to_owned() },
        }
    }

    fn from_interactive(payload: &Value) -> Self {
        if str_at(payload, "type") != Some("block_actions") {
            let kind = str_at(payload, "type").unwrap_or("interactive");
            return Self::Unsupported { event_type: kind.to_owned() };
        }

        let action = payload.get("actions").and_then(|actions| actions.get(0)).unwrap_or(&Value::Null);
        let message = payload.get("message").unwrap_or(&Value::Null);
        let Some(action_id) = str_at(action, "action_id") else {
            return Self::Unsupported { event_type: "block_actions.malformed".to_owned() };
        };

        Self::BlockAction(BlockActionEvent {
            channel_id: nested_str(payload, "channel", "id").unwrap_or_default().to_owned(),
            message_ts: str_at(message, "ts").unwrap_or_default().to_owned(),
            thread_ts: str_at(message, "thread_ts").map(str::to_owned),
            user_id: nested_str(payload, "user", "id").unwrap_or_default().to_owned(),
            action_id: action_id.to_owned(),
            value: str_at(action, "value").map(str::to_owned),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    DirectMessage,
    AppMention,
    BlockAction,
    Unsupported,
}

/// A user message the assistant should answer, in a DM thread or via a mention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationEvent {
    pub channel_id: String,
    pub team_id: Option<String>,
    pub user_id: String,
    /// `thread_ts` of the parent, or the message's own `ts` for a new thread.
    pub thread_ts: String,
    pub text: String,
}

impl ConversationEvent {
    fn from_event(event: &Value, team_id: Option<&str>) -> Option<Self> {
        let ts = str_at(event, "ts")?;
        Some(Self {
            channel_id: str_at(event, "channel")?.to_owned(),
            team_id: team_id.map(str::to_owned),
            user_id: str_at(event, "user")?.to_owned(),
            thread_ts: str_at(event, "thread_ts").unwrap_or(ts).to_owned(),
            text: str_at(event, "text").unwrap_or_default().to_owned(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub message_ts: String,
    pub thread_ts: Option<String>,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
}

fn str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn nested_str<'a>(value: &'a Value, outer: &str, inner: &str) -> Option<&'a str> {
    value.get(outer).and_then(|nested| str_at(nested, inner))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("conversation handler failure: {0}")]
    Conversation(String),
    #[error("block action handler failure: {0}")]
    BlockAction(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers the assistant handlers for direct messages, mentions and feedback.
pub fn assistant_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: ConversationService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(DirectMessageHandler::new(Arc::clone(&service)));
    dispatcher.register(AppMentionHandler::new(service));
    dispatcher.register(BlockActionHandler::new(FeedbackLogger));
    dispatcher
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationKind {
    DirectMessage,
    AppMention,
}

#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn handle_conversation(
        &self,
        kind: ConversationKind,
        event: &ConversationEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;
}

pub struct DirectMessageHandler<S> {
    service: Arc<S>,
}

impl<S> DirectMessageHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for DirectMessageHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::DirectMessage
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::DirectMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_conversation(ConversationKind::DirectMessage, event, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

pub struct AppMentionHandler<S> {
    service: Arc<S>,
}

impl<S> AppMentionHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for AppMentionHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppMention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppMention(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_conversation(ConversationKind::AppMention, event, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
pub trait BlockActionService: Send + Sync {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: S,
}

impl<S> BlockActionHandler<S>
where
    S: BlockActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BlockActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_block_action(event, ctx).await?;
        Ok(HandlerResult::Processed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackSentiment {
    Positive,
    Negative,
}

impl FeedbackSentiment {
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            POSITIVE_FEEDBACK_VALUE => Some(Self::Positive),
            NEGATIVE_FEEDBACK_VALUE => Some(Self::Negative),
            _ => None,
        }
    }
}

/// Records thumbs up/down on answers. Nothing is posted back.
pub struct FeedbackLogger;

#[async_trait]
impl BlockActionService for FeedbackLogger {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        if event.action_id != FEEDBACK_ACTION_ID {
            return Ok(());
        }

        let sentiment = event.value.as_deref().and_then(FeedbackSentiment::from_value).ok_or_else(|| {
            EventHandlerError::BlockAction(format!(
                "unrecognized feedback value `{}`",
                event.value.as_deref().unwrap_or("")
            ))
        })?;

        info!(
            event_name = "ingress.slack.feedback",
            correlation_id = %ctx.correlation_id,
            thread_id = event.thread_ts.as_deref().unwrap_or("unknown"),
            user_id = %event.user_id,
            message_ts = %event.message_ts,
            sentiment = ?sentiment,
            "received answer feedback"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::{
        assistant_dispatcher, BlockActionEvent, ConversationEvent, ConversationKind,
        ConversationService, EventContext, EventDispatcher, EventHandlerError, HandlerResult,
        SlackEnvelope, SlackEvent,
    };

    #[derive(Default)]
    struct RecordingService {
        seen: Mutex<Vec<(ConversationKind, String)>>,
    }

    #[async_trait]
    impl ConversationService for RecordingService {
        async fn handle_conversation(
            &self,
            kind: ConversationKind,
            event: &ConversationEvent,
            _ctx: &EventContext,
        ) -> Result<(), EventHandlerError> {
            self.seen.lock().await.push((kind, event.text.clone()));
            Ok(())
        }
    }

    fn conversation(text: &str) -> ConversationEvent {
        ConversationEvent {
            channel_id: "D1".to_owned(),
            team_id: Some("T1".to_owned()),
            user_id: "U1".to_owned(),
            thread_ts: "1700000000.000100".to_owned(),
            text: text.to_owned(),
        }
    }

    #[test]
    fn direct_message_payload_parses_with_thread_fallback() {
        let payload = json!({
            "team_id": "T1",
            "event": {
                "type": "message",
                "channel_type": "im",
                "channel": "D1",
                "user": "U1",
                "text": "List my top 3 accounts",
                "ts": "1700000000.000100"
            }
        });

        let event = SlackEvent::from_socket_payload("events_api", &payload);

        assert_eq!(event, SlackEvent::DirectMessage(conversation("List my top 3 accounts")));
    }

    #[test]
    fn bot_and_subtype_messages_are_ignored() {
        for extra in [json!({"bot_id": "B1"}), json!({"subtype": "message_changed"})] {
            let mut event = json!({
                "type": "message", "channel_type": "im", "channel": "D1",
                "user": "U1", "text": "hi", "ts": "1.0"
            });
            if let (Some(event), Some(extra)) = (event.as_object_mut(), extra.as_object()) {
                event.extend(extra.clone());
            }

            let parsed = SlackEvent::from_socket_payload("events_api", &json!({"event": event}));
            assert_eq!(parsed.event_type(), super::SlackEventType::Unsupported);
        }
    }

    #[test]
    fn app_mention_keeps_parent_thread() {
        let payload = json!({
            "event": {
                "type": "app_mention",
                "team": "T1",
                "channel": "C1",
                "user": "U2",
                "text": "<@UBOT> open opportunities?",
                "ts": "1700000000.000300",
                "thread_ts": "1700000000.000100"
            }
        });

        let SlackEvent::AppMention(event) = SlackEvent::from_socket_payload("events_api", &payload)
        else {
            panic!("expected app mention");
        };

        assert_eq!(event.thread_ts, "1700000000.000100");
        assert_eq!(event.team_id.as_deref(), Some("T1"));
    }

    #[test]
    fn feedback_block_action_parses() {
        let payload = json!({
            "type": "block_actions",
            "user": {"id": "U1"},
            "channel": {"id": "D1"},
            "message": {"ts": "1700000000.000200", "thread_ts": "1700000000.000100"},
            "actions": [{"action_id": "feedback", "value": "good-feedback"}]
        });

        let event = SlackEvent::from_socket_payload("interactive", &payload);

        assert_eq!(
            event,
            SlackEvent::BlockAction(BlockActionEvent {
                channel_id: "D1".to_owned(),
                message_ts: "1700000000.000200".to_owned(),
                thread_ts: Some("1700000000.000100".to_owned()),
                user_id: "U1".to_owned(),
                action_id: "feedback".to_owned(),
                value: Some("good-feedback".to_owned()),
            })
        );
    }

    #[tokio::test]
    async fn dispatcher_routes_both_triggers_to_one_service() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = assistant_dispatcher(Arc::clone(&service));

        for (envelope_id, event) in [
            ("env-1", SlackEvent::DirectMessage(conversation("dm"))),
            ("env-2", SlackEvent::AppMention(conversation("mention"))),
        ] {
            let envelope = SlackEnvelope { envelope_id: envelope_id.to_owned(), event };
            let result =
                dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");
            assert_eq!(result, HandlerResult::Processed);
        }

        assert_eq!(
            *service.seen.lock().await,
            vec![
                (ConversationKind::DirectMessage, "dm".to_owned()),
                (ConversationKind::AppMention, "mention".to_owned()),
            ]
        );
        assert_eq!(dispatcher.handler_count(), 3);
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let envelope = SlackEnvelope {
            envelope_id: "env-3".to_owned(),
            event: SlackEvent::DirectMessage(conversation("hello")),
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn unknown_feedback_value_is_an_error() {
        let dispatcher = assistant_dispatcher(Arc::new(RecordingService::default()));
        let envelope = SlackEnvelope {
            envelope_id: "env-4".to_owned(),
            event: SlackEvent::BlockAction(BlockActionEvent {
                channel_id: "D1".to_owned(),
                message_ts: "1.0".to_owned(),
                thread_ts: None,
                user_id: "U1".to_owned(),
                action_id: "feedback".to_owned(),
                value: Some("meh".to_owned()),
            }),
        };

        let result = dispatcher.dispatch(&envelope, &EventContext::default()).await;

        assert!(result.is_err());
    }
}
