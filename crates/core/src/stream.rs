use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("stream already stopped")]
    Stopped,
    #[error("stream delivery failed: {0}")]
    Delivery(String),
}

/// Destination-bound delivery channel for generated text.
///
/// Chunks must reach the destination in `append` order. `stop` finalizes the
/// destination with optional trailing blocks; after it returns, further `append`
/// calls fail with [`SinkError::Stopped`].
#[async_trait]
pub trait StreamSink: Send {
    async fn append(&mut self, text: &str) -> Result<(), SinkError>;
    async fn stop(&mut self, trailing_blocks: Vec<Value>) -> Result<(), SinkError>;
}

/// Sink that keeps everything in memory; used by tests and the CLI.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemorySink {
    pub chunks: Vec<String>,
    pub trailing_blocks: Vec<Value>,
    pub stop_calls: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.chunks.concat()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_calls > 0
    }
}

#[async_trait]
impl StreamSink for MemorySink {
    async fn append(&mut self, text: &str) -> Result<(), SinkError> {
        if self.is_stopped() {
            return Err(SinkError::Stopped);
        }
        self.chunks.push(text.to_owned());
        Ok(())
    }

    async fn stop(&mut self, trailing_blocks: Vec<Value>) -> Result<(), SinkError> {
        if self.is_stopped() {
            return Err(SinkError::Stopped);
        }
        self.stop_calls += 1;
        self.trailing_blocks = trailing_blocks;
        Ok(())
    }
}
