use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use slackforce_agent::{
    AgentRuntime, AgentSettings, ConversationTrigger, GeminiClient, HydratedThread, RunRequest,
};
use slackforce_core::config::{AppConfig, LoadOptions};
use slackforce_core::{SinkError, StreamSink};
use slackforce_mcp::McpSessionFactory;
use tokio_util::sync::CancellationToken;

use super::{block_on, CommandResult};

/// Writes streamed chunks straight to a writer, flushing after each one.
pub struct WriterSink<W> {
    writer: W,
    stopped: bool,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, stopped: false }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> StreamSink for WriterSink<W>
where
    W: Write + Send,
{
    async fn append(&mut self, text: &str) -> Result<(), SinkError> {
        if self.stopped {
            return Err(SinkError::Stopped);
        }
        self.writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|error| SinkError::Delivery(error.to_string()))
    }

    async fn stop(&mut self, _trailing_blocks: Vec<Value>) -> Result<(), SinkError> {
        if self.stopped {
            return Err(SinkError::Stopped);
        }
        self.stopped = true;
        writeln!(self.writer).map_err(|error| SinkError::Delivery(error.to_string()))
    }
}

pub fn run(query: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions { skip_slack: true, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("ask", "config_validation", error.to_string(), 2),
    };
    super::init_logging(&config);
    let model = match GeminiClient::from_config(&config.llm) {
        Ok(model) => model,
        Err(error) => return CommandResult::failure("ask", "config_validation", error.to_string(), 2),
    };

    let runtime = AgentRuntime::new(
        Arc::new(model),
        Arc::new(McpSessionFactory::from_config(&config.mcp)),
        AgentSettings::from_config(&config),
    );

    let result = block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        });

        let mut sink = WriterSink::new(std::io::stdout());
        ask(&runtime, query, &mut sink, &cancel).await
    });

    match result {
        Ok(result) => result,
        Err(error) => CommandResult::failure("ask", "runtime", error.to_string(), 1),
    }
}

/// Runs one question through the tool loop; the answer goes to `sink`, the outcome is returned.
pub async fn ask(
    runtime: &AgentRuntime,
    query: &str,
    sink: &mut dyn StreamSink,
    cancel: &CancellationToken,
) -> CommandResult {
    let request = RunRequest::new(
        ConversationTrigger::Cli,
        "cli",
        HydratedThread::query_only(query.trim()),
    );

    match runtime.run(request, sink, cancel).await {
        Ok(summary) => CommandResult::success(
            "ask",
            format!(
                "answered after {} generation call(s) and {} tool call(s) ({} failed)",
                summary.generation_calls, summary.tool_calls, summary.tool_failures
            ),
        ),
        Err(error) => CommandResult::failure("ask", error.kind(), error.to_string(), 1),
    }
}
