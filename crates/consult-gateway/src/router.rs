use crate::connection::ConnectionRegistry;
use async_trait::async_trait;
use consult_agent::{NoFollowUps, OutputSink, SessionRunner};
use consult_core::ConsultResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// `{type, content}` frame sent by the browser.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub content: String,
}

/// Frames sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// A status line for the terminal pane.
    Terminal(String),
    /// A chunk of streamed model output.
    Stream(String),
    /// The session has finished.
    Complete(String),
}

/// [`OutputSink`] that writes frames to one connection.
pub struct WsSink {
    connections: Arc<ConnectionRegistry>,
    connection_id: Uuid,
    stream_delay: Duration,
}

impl WsSink {
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        connection_id: Uuid,
        stream_delay: Duration,
    ) -> Self {
        Self {
            connections,
            connection_id,
            stream_delay,
        }
    }

    async fn send(&self, frame: OutboundFrame) -> bool {
        match serde_json::to_string(&frame) {
            Ok(json) => self.connections.send_to(self.connection_id, &json).await,
            Err(e) => {
                warn!(error = %e, "Failed to encode frame");
                false
            }
        }
    }
}

#[async_trait]
impl OutputSink for WsSink {
    async fn terminal(&self, line: &str) {
        self.send(OutboundFrame::Terminal(line.to_string())).await;
    }

    async fn stream(&self, chunk: &str) {
        // Pacing for client-side rendering only.
        if self.send(OutboundFrame::Stream(chunk.to_string())).await && !self.stream_delay.is_zero() {
            tokio::time::sleep(self.stream_delay).await;
        }
    }

    async fn complete(&self, summary: &str) {
        self.send(OutboundFrame::Complete(summary.to_string())).await;
    }
}

/// Turns inbound frames into consulting sessions.
pub struct MessageRouter {
    runner: Arc<SessionRunner>,
    connections: Arc<ConnectionRegistry>,
    stream_delay: Duration,
}

impl MessageRouter {
    pub fn new(
        runner: Arc<SessionRunner>,
        connections: Arc<ConnectionRegistry>,
        stream_delay: Duration,
    ) -> Self {
        Self {
            runner,
            connections,
            stream_delay,
        }
    }

    pub fn sink_for(&self, connection_id: Uuid) -> WsSink {
        WsSink::new(self.connections.clone(), connection_id, self.stream_delay)
    }

    /// Handle one raw text frame from `connection_id`.
    pub async fn handle_text(&self, text: &str, connection_id: Uuid) -> ConsultResult<()> {
        let sink = self.sink_for(connection_id);
        let inbound: InboundMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Malformed frame");
                sink.terminal(&format!("Invalid message: {e}")).await;
                return Ok(());
            }
        };

        if inbound.msg_type != "message" {
            debug!(connection_id = %connection_id, msg_type = %inbound.msg_type, "Ignoring frame");
            return Ok(());
        }

        info!(connection_id = %connection_id, "Starting session for connection");
        let result = self
            .runner
            .run_session(&inbound.content, &mut NoFollowUps, Arc::new(self.sink_for(connection_id)))
            .await;

        match result {
            Ok(outcome) => {
                info!(
                    connection_id = %connection_id,
                    session_id = %outcome.session_id,
                    turns = outcome.turns,
                    "Session finished"
                );
                Ok(())
            }
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Session failed");
                sink.terminal(&format!("Error: {e}")).await;
                sink.complete("Session ended with an error.").await;
                Err(e)
            }
        }
    }
}
