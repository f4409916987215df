use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use slackforce_core::{SinkError, StreamSink};

use crate::web::{SlackApi, SlackApiError, StreamTarget};

impl From<SlackApiError> for SinkError {
    fn from(error: SlackApiError) -> Self {
        SinkError::Delivery(error.to_string())
    }
}

/// Streams markdown into one Slack thread through `chat.*Stream`.
///
/// Text is buffered until `buffer_size` bytes accumulate. The Slack message is created
/// lazily on the first flush, so a run that fails before producing output still
/// gets a single message carrying the warning.
pub struct SlackChatStream {
    api: Arc<dyn SlackApi>,
    target: StreamTarget,
    buffer_size: usize,
    buffer: String,
    stream_ts: Option<String>,
    stopped: bool,
}

impl SlackChatStream {
    pub fn new(api: Arc<dyn SlackApi>, target: StreamTarget, buffer_size: usize) -> Self {
        Self { api, target, buffer_size, buffer: String::new(), stream_ts: None, stopped: false }
    }

    pub fn stream_ts(&self) -> Option<&str> {
        self.stream_ts.as_deref()
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        let text = std::mem::take(&mut self.buffer);
        if let Some(ts) = self.stream_ts.as_deref() {
            self.api.append_stream(&self.target.channel_id, ts, &text).await?;
        } else {
            self.stream_ts = Some(self.api.start_stream(&self.target, &text).await?);
        }
        Ok(())
    }
}

#[async_trait]
impl StreamSink for SlackChatStream {
    async fn append(&mut self, text: &str) -> Result<(), SinkError> {
        if self.stopped {
            return Err(SinkError::Stopped);
        }

        self.buffer.push_str(text);
        if self.buffer.len() >= self.buffer_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn stop(&mut self, trailing_blocks: Vec<Value>) -> Result<(), SinkError> {
        if self.stopped {
            return Err(SinkError::Stopped);
        }
        self.stopped = true;

        let remaining = std::mem::take(&mut self.buffer);
        match self.stream_ts.clone() {
            Some(ts) => {
                self.api
                    .stop_stream(&self.target.channel_id, &ts, Some(&remaining), &trailing_blocks)
                    .await?;
            }
            // Short answers open the stream with their full text and close it right away.
            None => {
                let ts = self.api.start_stream(&self.target, &remaining).await?;
                self.stream_ts = Some(ts.clone());
                self.api.stop_stream(&self.target.channel_id, &ts, None, &trailing_blocks).await?;
            }
        }
        Ok(())
    }
}
