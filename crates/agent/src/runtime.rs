use std::sync::Arc;

use serde_json::Value;
use slackforce_core::config::{AppConfig, ToolFailurePolicy};
use slackforce_core::{
    ConversationState, StreamSink, ToolCallOutcome, ToolCallRequest, ToolCallResult, Turn,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::{build_tool_config, CatalogError};
use crate::conversation::HydratedThread;
use crate::error::AgentError;
use crate::guardrails::{run_guarded, GuardrailDecision, Interrupted, LoopGuardrails};
use crate::llm::{GenerationError, GenerationRequest, ModelClient, ToolConfig};
use crate::stream::StreamGuard;
use crate::tools::{error_payload, result_payload, ToolProtocolError, ToolSession, ToolSessionFactory};

/// Where a run came from. Only used for logging; every trigger runs the same loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationTrigger {
    DirectMessage,
    AppMention,
    Cli,
}

impl ConversationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectMessage => "direct_message",
            Self::AppMention => "app_mention",
            Self::Cli => "cli",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunRequest {
    pub run_id: String,
    pub trigger: ConversationTrigger,
    pub thread_id: String,
    pub history: Vec<Turn>,
    pub query: String,
    /// Block Kit blocks attached when the stream stops, on success and failure alike.
    pub trailing_blocks: Vec<Value>,
}

impl RunRequest {
    pub fn new(
        trigger: ConversationTrigger,
        thread_id: impl Into<String>,
        thread: HydratedThread,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            trigger,
            thread_id: thread_id.into(),
            history: thread.history,
            query: thread.query,
            trailing_blocks: Vec::new(),
        }
    }

    pub fn with_trailing_blocks(mut self, trailing_blocks: Vec<Value>) -> Self {
        self.trailing_blocks = trailing_blocks;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub answer: String,
    pub generation_calls: u32,
    pub tool_rounds: u32,
    pub tool_calls: u32,
    pub tool_failures: u32,
    pub final_turn_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSettings {
    pub model: String,
    pub system_prompt: Option<String>,
    pub guardrails: LoopGuardrails,
    pub tool_failure_policy: ToolFailurePolicy,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            system_prompt: config.llm.system_prompt.clone(),
            guardrails: LoopGuardrails::from_config(config),
            tool_failure_policy: config.agent.tool_failure_policy,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            system_prompt: None,
            guardrails: LoopGuardrails::default(),
            tool_failure_policy: ToolFailurePolicy::Skip,
        }
    }
}

/// The tool-calling loop shared by every trigger.
///
/// Holds no per-run state, so one runtime serves concurrent runs. Each run opens its
/// own tool session and owns its conversation state.
pub struct AgentRuntime {
    model: Arc<dyn ModelClient>,
    tools: Arc<dyn ToolSessionFactory>,
    settings: AgentSettings,
}

impl AgentRuntime {
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<dyn ToolSessionFactory>,
        settings: AgentSettings,
    ) -> Self {
        Self { model, tools, settings }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Runs one request to completion and stops `sink` exactly once.
    ///
    /// Failures are reported to the sink as a single warning before stopping; the
    /// error is still returned for logging by the caller.
    pub async fn run(
        &self,
        request: RunRequest,
        sink: &mut dyn StreamSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, AgentError> {
        let RunRequest { run_id, trigger, thread_id, history, query, trailing_blocks } = request;
        let mut stream = StreamGuard::new(sink, run_id.clone());

        info!(
            event_name = "agent.run.start",
            correlation_id = %run_id,
            thread_id = %thread_id,
            trigger = trigger.as_str(),
            history_turns = history.len(),
            "starting tool loop run"
        );

        let outcome = self.run_with_session(&run_id, history, query, &mut stream, cancel).await;

        match &outcome {
            Ok(summary) => info!(
                event_name = "agent.run.completed",
                correlation_id = %run_id,
                thread_id = %thread_id,
                generation_calls = summary.generation_calls,
                tool_calls = summary.tool_calls,
                tool_failures = summary.tool_failures,
                "tool loop run completed"
            ),
            Err(run_error) => {
                error!(
                    event_name = "agent.run.failed",
                    correlation_id = %run_id,
                    thread_id = %thread_id,
                    error_kind = run_error.kind(),
                    error = %run_error,
                    "tool loop run failed"
                );
                if let Err(sink_error) = stream.append(&run_error.warning_text()).await {
                    warn!(
                        event_name = "agent.run.warning_undelivered",
                        correlation_id = %run_id,
                        error = %sink_error,
                        "could not deliver failure warning"
                    );
                }
            }
        }

        if let Err(sink_error) = stream.stop(trailing_blocks).await {
            warn!(
                event_name = "agent.stream.stop_failed",
                correlation_id = %run_id,
                thread_id = %thread_id,
                error = %sink_error,
                "failed to stop stream"
            );
        }

        outcome
    }

    async fn run_with_session(
        &self,
        run_id: &str,
        history: Vec<Turn>,
        query: String,
        stream: &mut StreamGuard<'_>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, AgentError> {
        let timeout = self.settings.guardrails.tool_timeout;
        let mut session = match run_guarded(self.tools.open(), timeout, cancel).await {
            Ok(Ok(session)) => session,
            Ok(Err(open_error)) => return Err(CatalogError::Listing(open_error).into()),
            Err(Interrupted::Cancelled) => return Err(AgentError::Cancelled),
            Err(Interrupted::TimedOut) => {
                return Err(CatalogError::Listing(ToolProtocolError::Connect(format!(
                    "session did not start within {}s",
                    timeout.as_secs()
                )))
                .into())
            }
        };

        let outcome = self.drive(run_id, session.as_mut(), history, query, stream, cancel).await;

        if let Err(close_error) = session.close().await {
            warn!(
                event_name = "agent.tools.close_failed",
                correlation_id = %run_id,
                error = %close_error,
                "failed to close tool session"
            );
        }

        outcome
    }

    async fn drive(
        &self,
        run_id: &str,
        session: &mut dyn ToolSession,
        history: Vec<Turn>,
        query: String,
        stream: &mut StreamGuard<'_>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, AgentError> {
        let guardrails = &self.settings.guardrails;

        let descriptors = match run_guarded(session.list_tools(), guardrails.tool_timeout, cancel).await {
            Ok(listing) => listing.map_err(CatalogError::Listing)?,
            Err(Interrupted::Cancelled) => return Err(AgentError::Cancelled),
            Err(Interrupted::TimedOut) => {
                return Err(CatalogError::Listing(ToolProtocolError::Timeout {
                    name: "list_tools".to_string(),
                    timeout_secs: guardrails.tool_timeout.as_secs(),
                })
                .into())
            }
        };
        let tool_config = build_tool_config(&descriptors)?;
        debug!(
            event_name = "agent.tools.catalog_built",
            correlation_id = %run_id,
            tools = tool_config.as_ref().map(ToolConfig::len).unwrap_or(0),
            "built function declarations"
        );

        let mut state = ConversationState::seed(history);
        state.append_user_query(query);

        let mut summary = RunSummary::default();
        loop {
            let response = self.generate(&state, tool_config.as_ref(), cancel).await?;
            summary.generation_calls += 1;

            if !response.has_function_calls() {
                let answer = response.text();
                state.append_model_turn(response)?;
                stream.append(&answer).await?;
                summary.answer = answer;
                summary.final_turn_count = state.len();
                return Ok(summary);
            }

            if let GuardrailDecision::Deny { reason_code, user_message } =
                guardrails.evaluate_round(summary.tool_rounds)
            {
                warn!(
                    event_name = "agent.loop.round_cap",
                    correlation_id = %run_id,
                    reason_code,
                    detail = %user_message,
                    "tool loop stopped by round cap"
                );
                return Err(AgentError::LoopExceeded { rounds: guardrails.max_tool_rounds });
            }

            let requests: Vec<ToolCallRequest> =
                response.function_calls().map(ToolCallRequest::from).collect();
            state.append_model_turn(response)?;
            summary.tool_rounds += 1;

            for request in requests {
                summary.tool_calls += 1;
                let result = self.call_tool(session, request, cancel).await?;
                match result.outcome {
                    ToolCallOutcome::Payload(output) => {
                        state.append_tool_response(&result.name, result_payload(output))?
                    }
                    ToolCallOutcome::Error(message) => {
                        summary.tool_failures += 1;
                        warn!(
                            event_name = "agent.tools.call_failed",
                            correlation_id = %run_id,
                            tool = %result.name,
                            error = %message,
                            "tool call failed; continuing"
                        );
                        if self.settings.tool_failure_policy == ToolFailurePolicy::ReportToModel {
                            state.append_tool_response(&result.name, error_payload(&message))?;
                        }
                    }
                }
            }
        }
    }

    async fn generate(
        &self,
        state: &ConversationState,
        tools: Option<&ToolConfig>,
        cancel: &CancellationToken,
    ) -> Result<Turn, AgentError> {
        let request = GenerationRequest {
            model: &self.settings.model,
            system_prompt: self.settings.system_prompt.as_deref(),
            turns: state.turns(),
            tools,
        };
        let deadline = self.settings.guardrails.generation_timeout;

        match run_guarded(self.model.generate(request), deadline, cancel).await {
            Ok(generated) => Ok(generated?),
            Err(Interrupted::Cancelled) => Err(AgentError::Cancelled),
            Err(Interrupted::TimedOut) => Err(GenerationError::Timeout(deadline.as_secs()).into()),
        }
    }

    /// Runs one call under the tool deadline. Only cancellation aborts the run; every
    /// other failure comes back as an error outcome for the failure policy to handle.
    async fn call_tool(
        &self,
        session: &mut dyn ToolSession,
        request: ToolCallRequest,
        cancel: &CancellationToken,
    ) -> Result<ToolCallResult, AgentError> {
        let deadline = self.settings.guardrails.tool_timeout;
        let ToolCallRequest { name, arguments } = request;
        match run_guarded(session.call_tool(&name, arguments), deadline, cancel).await {
            Ok(Ok(output)) => Ok(ToolCallResult::success(name, output)),
            Ok(Err(tool_error)) => Ok(ToolCallResult::failure(name, tool_error.to_string())),
            Err(Interrupted::Cancelled) => Err(AgentError::Cancelled),
            Err(Interrupted::TimedOut) => {
                let timeout = ToolProtocolError::Timeout {
                    name: name.clone(),
                    timeout_secs: deadline.as_secs(),
                };
                Ok(ToolCallResult::failure(name, timeout.to_string()))
            }
        }
    }
}
