use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::{net::TcpStream, sync::Mutex, task::JoinSet};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    events::{DispatchError, EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent},
    web::SlackApi,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("slack requested a reconnect: {0}")]
    Disconnected(String),
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the transport has nothing more to deliver and the runner should stop.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// One decoded Socket Mode frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    reason: Option<String>,
}

pub fn parse_frame(text: &str) -> Result<SocketFrame, TransportError> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|error| TransportError::Receive(format!("malformed socket frame: {error}")))?;

    match raw.frame_type.as_str() {
        "hello" => Ok(SocketFrame::Hello),
        "disconnect" => Ok(SocketFrame::Disconnect {
            reason: raw.reason.unwrap_or_else(|| "unspecified".to_owned()),
        }),
        frame_type => {
            let envelope_id = raw.envelope_id.ok_or_else(|| {
                TransportError::Receive(format!("`{frame_type}` frame has no envelope_id"))
            })?;
            Ok(SocketFrame::Envelope(SlackEnvelope {
                envelope_id,
                event: SlackEvent::from_socket_payload(frame_type, &raw.payload),
            }))
        }
    }
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode transport over a WebSocket URL obtained from `apps.connections.open`.
pub struct SlackSocketTransport {
    api: Arc<dyn SlackApi>,
    stream: Mutex<Option<SocketStream>>,
}

impl SlackSocketTransport {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for SlackSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .api
            .open_socket_url()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Receive("socket is not connected".to_owned()));
        };

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Disconnected("socket closed".to_owned())),
            };

            match message {
                Message::Text(text) => match parse_frame(&text)? {
                    SocketFrame::Hello => debug!("socket mode hello received"),
                    SocketFrame::Disconnect { reason } => {
                        return Err(TransportError::Disconnected(reason))
                    }
                    SocketFrame::Envelope(envelope) => return Ok(Some(envelope)),
                },
                Message::Close(frame) => {
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .unwrap_or_else(|| "close frame".to_owned());
                    return Err(TransportError::Disconnected(reason));
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Acknowledge("socket is not connected".to_owned()));
        };

        let ack = json!({ "envelope_id": envelope_id }).to_string();
        stream
            .send(Message::Text(ack))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Runs until the transport is exhausted, retries run out, or `shutdown` fires.
    ///
    /// Handler tasks outlive the connection that delivered them; they are only awaited
    /// once the runner itself is done.
    pub async fn start(&self, shutdown: &CancellationToken) {
        let mut in_flight = JoinSet::new();
        self.run_connections(shutdown, &mut in_flight).await;

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "waiting for in-flight slack event handlers");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "event handler task panicked");
            }
        }
    }

    async fn run_connections(&self, shutdown: &CancellationToken, in_flight: &mut JoinSet<()>) {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(attempt, shutdown, in_flight).await {
                Ok(()) => return,
                Err(TransportError::Disconnected(reason)) => {
                    info!(reason = %reason, "socket mode connection refreshed by slack");
                    attempt = 0;
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    attempt += 1;
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = shutdown.cancelled() => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        shutdown: &CancellationToken,
        in_flight: &mut JoinSet<()>,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("socket mode shutdown requested");
                    break Ok(());
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(error) = joined {
                        warn!(error = %error, "event handler task panicked");
                    }
                    continue;
                }
                next = self.transport.next_envelope() => next,
            };

            let envelope = match next {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    info!(attempt, "socket mode transport stream closed");
                    break Ok(());
                }
                Err(error) => break Err(error),
            };
            let thread_id = envelope.event.thread_ts().unwrap_or("unknown").to_owned();

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                thread_id = %thread_id,
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    thread_id = %thread_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    thread_id = %thread_id,
                    "acknowledged slack envelope"
                );
            }

            // Agent runs take seconds; handling inline would stall acks for later envelopes.
            let dispatcher = Arc::clone(&self.dispatcher);
            in_flight.spawn(async move {
                let context = EventContext { correlation_id: envelope.envelope_id.clone() };
                match dispatcher.dispatch(&envelope, &context).await {
                    Ok(HandlerResult::Ignored) => debug!(
                        envelope_id = %envelope.envelope_id,
                        event_type = ?envelope.event.event_type(),
                        "no handler for slack event"
                    ),
                    Ok(HandlerResult::Processed) => {}
                    Err(error) => warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        thread_id = %thread_id,
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    ),
                }
            });
        };

        if outcome.is_ok() {
            self.transport.disconnect().await?;
        }
        outcome
    }
}
