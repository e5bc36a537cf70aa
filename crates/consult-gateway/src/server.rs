use crate::connection::{Connection, ConnectionRegistry};
use crate::router::MessageRouter;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use consult_agent::SessionRunner;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

const BUILTIN_INDEX: &str = include_str!("../static/index.html");

/// `[server]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTML file served at `/`; the built-in page when absent.
    pub index_page: Option<PathBuf>,
    /// Pause after each forwarded stream chunk.
    #[serde(default = "default_stream_delay_ms")]
    pub stream_delay_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_stream_delay_ms() -> u64 {
    50
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            index_page: None,
            stream_delay_ms: default_stream_delay_ms(),
        }
    }
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared application state.
pub struct AppState {
    pub router: Arc<MessageRouter>,
    pub connections: Arc<ConnectionRegistry>,
    pub index_page: Option<PathBuf>,
}

/// The web gateway.
pub struct GatewayServer;

impl GatewayServer {
    pub fn build(runner: Arc<SessionRunner>, config: &GatewayConfig) -> Router {
        let connections = ConnectionRegistry::new();
        let router = Arc::new(MessageRouter::new(
            runner,
            connections.clone(),
            Duration::from_millis(config.stream_delay_ms),
        ));

        let state = Arc::new(AppState {
            router,
            connections,
            index_page: config.index_page.clone(),
        });

        Router::new()
            .route("/", get(index_handler))
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
    }
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.index_page {
        None => Html(BUILTIN_INDEX).into_response(),
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(page) => Html(page).into_response(),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read index page");
                (StatusCode::INTERNAL_SERVER_ERROR, "index page unavailable").into_response()
            }
        },
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "consult",
        "connections": state.connections.connection_count().await,
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state
        .connections
        .add(Connection {
            id: connection_id,
            tx,
        })
        .await;
    info!(connection_id = %connection_id, "WebSocket connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Frames from one connection are handled in order; a session runs to completion
    // before the next inbound message is read.
    let router = state.router.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = router.handle_text(text.as_str(), connection_id).await {
                        error!(error = %e, "Failed to handle message");
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.connections.remove(connection_id).await;
    info!(connection_id = %connection_id, "WebSocket disconnected");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: GatewayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.stream_delay_ms, 50);
        assert!(config.index_page.is_none());
    }

    #[test]
    fn test_builtin_index_connects_to_ws() {
        assert!(BUILTIN_INDEX.contains("/ws"));
    }
}
