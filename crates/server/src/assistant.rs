use std::sync::Arc;

use async_trait::async_trait;
use slackforce_agent::{hydrate_thread, AgentRuntime, ConversationTrigger, PriorMessage, RunRequest};
use slackforce_slack::{
    blocks::{error_message, feedback_block},
    events::{ConversationEvent, ConversationKind, ConversationService, EventContext, EventHandlerError},
    stream::SlackChatStream,
    web::{AssistantStatus, SlackApi, StreamTarget, ThreadMessage},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Answers Slack conversations by running the agent loop into a chat stream.
pub struct SlackAssistant {
    api: Arc<dyn SlackApi>,
    runtime: Arc<AgentRuntime>,
    history_limit: u32,
    stream_buffer_size: usize,
    shutdown: CancellationToken,
}

impl SlackAssistant {
    pub fn new(
        api: Arc<dyn SlackApi>,
        runtime: Arc<AgentRuntime>,
        history_limit: u32,
        stream_buffer_size: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self { api, runtime, history_limit, stream_buffer_size, shutdown }
    }

    async fn post_failure(&self, event: &ConversationEvent, summary: &str, ctx: &EventContext) {
        let message = error_message(summary, &ctx.correlation_id);
        if let Err(error) =
            self.api.post_message(&event.channel_id, Some(&event.thread_ts), &message).await
        {
            warn!(
                event_name = "slack.assistant.fallback_failed",
                correlation_id = %ctx.correlation_id,
                thread_id = %event.thread_ts,
                error = %error,
                "could not post failure message"
            );
        }
    }
}

fn prior_messages(messages: Vec<ThreadMessage>) -> Vec<PriorMessage> {
    messages
        .into_iter()
        .map(|message| {
            if message.is_from_bot() {
                PriorMessage::bot(message.text)
            } else {
                PriorMessage::human(message.text)
            }
        })
        .collect()
}

fn trigger_for(kind: ConversationKind) -> ConversationTrigger {
    match kind {
        ConversationKind::DirectMessage => ConversationTrigger::DirectMessage,
        ConversationKind::AppMention => ConversationTrigger::AppMention,
    }
}

#[async_trait]
impl ConversationService for SlackAssistant {
    async fn handle_conversation(
        &self,
        kind: ConversationKind,
        event: &ConversationEvent,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        // Mentions happen in regular channels, which have no assistant thread status.
        if kind == ConversationKind::DirectMessage {
            let status = AssistantStatus::thinking(&event.channel_id, &event.thread_ts);
            if let Err(error) = self.api.set_assistant_status(&status).await {
                warn!(
                    event_name = "slack.assistant.status_failed",
                    correlation_id = %ctx.correlation_id,
                    thread_id = %event.thread_ts,
                    error = %error,
                    "could not set assistant status"
                );
            }
        }

        let replies = match self
            .api
            .conversation_replies(&event.channel_id, &event.thread_ts, self.history_limit)
            .await
        {
            Ok(replies) => replies,
            Err(error) => {
                self.post_failure(event, &error.to_string(), ctx).await;
                return Err(EventHandlerError::Conversation(error.to_string()));
            }
        };

        let Some(thread) = hydrate_thread(prior_messages(replies)) else {
            info!(
                event_name = "slack.assistant.empty_thread",
                correlation_id = %ctx.correlation_id,
                thread_id = %event.thread_ts,
                "thread has no messages; nothing to answer"
            );
            return Ok(());
        };

        let target = StreamTarget {
            channel_id: event.channel_id.clone(),
            thread_ts: event.thread_ts.clone(),
            recipient_team_id: event.team_id.clone(),
            recipient_user_id: Some(event.user_id.clone()),
        };
        let mut sink = SlackChatStream::new(Arc::clone(&self.api), target, self.stream_buffer_size);
        let request = RunRequest::new(trigger_for(kind), event.thread_ts.clone(), thread)
            .with_trailing_blocks(feedback_block().block_values());

        let outcome = self.runtime.run(request, &mut sink, &self.shutdown.child_token()).await;
        let failure = match outcome {
            Ok(_) if sink.stream_ts().is_some() => return Ok(()),
            Ok(_) => "the answer stream could not be opened".to_owned(),
            Err(run_error) if sink.stream_ts().is_some() => {
                // The warning already went out through the stream.
                return Err(EventHandlerError::Conversation(run_error.to_string()));
            }
            Err(run_error) => run_error.to_string(),
        };

        self.post_failure(event, &failure, ctx).await;
        Err(EventHandlerError::Conversation(failure))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use slackforce_agent::{
        AgentRuntime, AgentSettings, GenerationError, GenerationRequest, ModelClient,
        ToolProtocolError, ToolSession, ToolSessionFactory,
    };
    use slackforce_core::{Part, ToolDescriptor, Turn};
    use slackforce_slack::{
        blocks::MessageTemplate,
        events::{ConversationEvent, ConversationKind, ConversationService, EventContext},
        web::{AssistantStatus, SlackApi, SlackApiError, StreamTarget, ThreadMessage},
    };
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    use super::SlackAssistant;

    #[derive(Debug, Clone, PartialEq)]
    enum SlackCall {
        Status(String),
        Replies(u32),
        Post(String),
        Start(String),
        Append(String),
        Stop(Option<String>, usize),
    }

    struct FakeSlack {
        replies: Result<Vec<ThreadMessage>, SlackApiError>,
        fail_start: bool,
        calls: Mutex<Vec<SlackCall>>,
    }

    impl FakeSlack {
        fn with_replies(replies: Vec<ThreadMessage>) -> Self {
            Self { replies: Ok(replies), fail_start: false, calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl SlackApi for FakeSlack {
        async fn conversation_replies(
            &self,
            _channel_id: &str,
            _thread_ts: &str,
            limit: u32,
        ) -> Result<Vec<ThreadMessage>, SlackApiError> {
            self.calls.lock().await.push(SlackCall::Replies(limit));
            self.replies.clone()
        }

        async fn set_assistant_status(&self, status: &AssistantStatus) -> Result<(), SlackApiError> {
            self.calls.lock().await.push(SlackCall::Status(status.status.clone()));
            Ok(())
        }

        async fn post_message(
            &self,
            _channel_id: &str,
            _thread_ts: Option<&str>,
            message: &MessageTemplate,
        ) -> Result<(), SlackApiError> {
            self.calls.lock().await.push(SlackCall::Post(message.fallback_text.clone()));
            Ok(())
        }

        async fn start_stream(
            &self,
            _target: &StreamTarget,
            markdown_text: &str,
        ) -> Result<String, SlackApiError> {
            self.calls.lock().await.push(SlackCall::Start(markdown_text.to_owned()));
            if self.fail_start {
                return Err(SlackApiError::Api {
                    method: "chat.startStream".to_owned(),
                    error: "not_allowed".to_owned(),
                });
            }
            Ok("1700000000.000900".to_owned())
        }

        async fn append_stream(
            &self,
            _channel_id: &str,
            _ts: &str,
            markdown_text: &str,
        ) -> Result<(), SlackApiError> {
            self.calls.lock().await.push(SlackCall::Append(markdown_text.to_owned()));
            Ok(())
        }

        async fn stop_stream(
            &self,
            _channel_id: &str,
            _ts: &str,
            markdown_text: Option<&str>,
            blocks: &[Value],
        ) -> Result<(), SlackApiError> {
            self.calls
                .lock()
                .await
                .push(SlackCall::Stop(markdown_text.map(str::to_owned), blocks.len()));
            Ok(())
        }

        async fn open_socket_url(&self) -> Result<String, SlackApiError> {
            Ok("wss://example.invalid/socket".to_owned())
        }
    }

    struct AnswerModel;

    #[async_trait]
    impl ModelClient for AnswerModel {
        async fn generate(&self, request: GenerationRequest<'_>) -> Result<Turn, GenerationError> {
            let question = request
                .turns
                .last()
                .and_then(|turn| turn.parts.first())
                .and_then(Part::as_text)
                .unwrap_or_default();
            Ok(Turn::model_text(format!("You asked: {question}")))
        }
    }

    struct EmptyTools;

    struct EmptySession;

    #[async_trait]
    impl ToolSession for EmptySession {
        async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, ToolProtocolError> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &mut self,
            name: &str,
            _arguments: Map<String, Value>,
        ) -> Result<Value, ToolProtocolError> {
            Err(ToolProtocolError::ToolFailed { name: name.to_owned(), message: "none".to_owned() })
        }

        async fn close(&mut self) -> Result<(), ToolProtocolError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ToolSessionFactory for EmptyTools {
        async fn open(&self) -> Result<Box<dyn ToolSession>, ToolProtocolError> {
            Ok(Box::new(EmptySession))
        }
    }

    fn assistant(slack: Arc<FakeSlack>) -> SlackAssistant {
        let runtime = AgentRuntime::new(
            Arc::new(AnswerModel),
            Arc::new(EmptyTools),
            AgentSettings::default(),
        );
        SlackAssistant::new(slack, Arc::new(runtime), 20, 256, CancellationToken::new())
    }

    fn event() -> ConversationEvent {
        ConversationEvent {
            channel_id: "D1".to_owned(),
            team_id: Some("T1".to_owned()),
            user_id: "U1".to_owned(),
            thread_ts: "1700000000.000100".to_owned(),
            text: "hi".to_owned(),
        }
    }

    fn message(text: &str, bot_id: Option<&str>) -> ThreadMessage {
        ThreadMessage {
            text: text.to_owned(),
            ts: "1.0".to_owned(),
            user: None,
            bot_id: bot_id.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn direct_message_sets_status_and_streams_answer_with_feedback() {
        let slack = Arc::new(FakeSlack::with_replies(vec![
            message("hello", None),
            message("Hi! How can I help?", Some("B1")),
            message("any open deals?", None),
        ]));

        assistant(Arc::clone(&slack))
            .handle_conversation(ConversationKind::DirectMessage, &event(), &EventContext::default())
            .await
            .expect("conversation handled");

        let calls = slack.calls.lock().await.clone();
        assert_eq!(calls[0], SlackCall::Status("thinking...".to_owned()));
        assert_eq!(calls[1], SlackCall::Replies(20));
        assert_eq!(calls[2], SlackCall::Start("You asked: any open deals?".to_owned()));
        assert_eq!(calls[3], SlackCall::Stop(None, 1));
        assert_eq!(calls.len(), 4);
    }

    #[tokio::test]
    async fn mentions_skip_assistant_status() {
        let slack = Arc::new(FakeSlack::with_replies(vec![message("<@UBOT> hi", None)]));

        assistant(Arc::clone(&slack))
            .handle_conversation(ConversationKind::AppMention, &event(), &EventContext::default())
            .await
            .expect("conversation handled");

        let calls = slack.calls.lock().await.clone();
        assert!(!calls.iter().any(|call| matches!(call, SlackCall::Status(_))));
        assert_eq!(calls[0], SlackCall::Replies(20));
    }

    #[tokio::test]
    async fn history_failure_posts_fallback_message() {
        let slack = Arc::new(FakeSlack {
            replies: Err(SlackApiError::Api {
                method: "conversations.replies".to_owned(),
                error: "channel_not_found".to_owned(),
            }),
            fail_start: false,
            calls: Mutex::new(Vec::new()),
        });

        let result = assistant(Arc::clone(&slack))
            .handle_conversation(ConversationKind::DirectMessage, &event(), &EventContext::default())
            .await;

        assert!(result.is_err());
        let calls = slack.calls.lock().await.clone();
        assert!(matches!(
            calls.last(),
            Some(SlackCall::Post(text)) if text.starts_with(":warning: Something went wrong!")
        ));
    }

    #[tokio::test]
    async fn empty_thread_is_not_answered() {
        let slack = Arc::new(FakeSlack::with_replies(Vec::new()));

        assistant(Arc::clone(&slack))
            .handle_conversation(ConversationKind::AppMention, &event(), &EventContext::default())
            .await
            .expect("empty thread is fine");

        assert_eq!(*slack.calls.lock().await, vec![SlackCall::Replies(20)]);
    }

    #[tokio::test]
    async fn stream_that_never_opens_falls_back_to_post_message() {
        let slack = Arc::new(FakeSlack {
            replies: Ok(vec![message("hello", None)]),
            fail_start: true,
            calls: Mutex::new(Vec::new()),
        });

        let result = assistant(Arc::clone(&slack))
            .handle_conversation(ConversationKind::AppMention, &event(), &EventContext::default())
            .await;

        assert!(result.is_err());
        let calls = slack.calls.lock().await.clone();
        assert_eq!(calls[1], SlackCall::Start("You asked: hello".to_owned()));
        assert!(!calls.iter().any(|call| matches!(call, SlackCall::Stop(..))));
        assert!(matches!(
            calls.last(),
            Some(SlackCall::Post(text)) if text.contains("could not be opened")
        ));
    }
}
