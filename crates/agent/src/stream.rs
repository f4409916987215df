use serde_json::Value;
use slackforce_core::{SinkError, StreamSink};
use tracing::warn;

/// Borrows a sink for one run and makes sure it is stopped exactly once.
///
/// `stop` consumes the guard. A guard dropped without stopping logs a warning so a
/// destination left "in progress" is visible.
pub struct StreamGuard<'a> {
    sink: &'a mut dyn StreamSink,
    correlation_id: String,
    stopped: bool,
}

impl<'a> StreamGuard<'a> {
    pub fn new(sink: &'a mut dyn StreamSink, correlation_id: impl Into<String>) -> Self {
        Self { sink, correlation_id: correlation_id.into(), stopped: false }
    }

    pub async fn append(&mut self, text: &str) -> Result<(), SinkError> {
        if text.is_empty() {
            return Ok(());
        }
        self.sink.append(text).await
    }

    pub async fn stop(mut self, trailing_blocks: Vec<Value>) -> Result<(), SinkError> {
        self.stopped = true;
        self.sink.stop(trailing_blocks).await
    }
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            warn!(
                event_name = "agent.stream.not_stopped",
                correlation_id = %self.correlation_id,
                "stream dropped without being stopped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use slackforce_core::MemorySink;

    use super::StreamGuard;

    #[tokio::test]
    async fn empty_chunks_are_not_forwarded() {
        let mut sink = MemorySink::new();
        let mut guard = StreamGuard::new(&mut sink, "run-1");
        guard.append("").await.expect("append");
        guard.append("hi").await.expect("append");
        guard.stop(vec![json!({"type": "divider"})]).await.expect("stop");

        assert_eq!(sink.chunks, vec!["hi".to_string()]);
        assert_eq!(sink.stop_calls, 1);
    }
}
