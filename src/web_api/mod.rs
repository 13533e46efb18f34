//! WebAPI - HTTP surface
//!
//! ## Responsibilities
//!
//! - Health endpoint
//! - WebSocket endpoint: one monitoring session per connection
//!
//! The WebSocket handler owns the session lifecycle: greeting on accept,
//! echo responses for client messages, alert delivery via the outbound
//! channel, and full teardown when the socket closes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;

use crate::models::{ClientMessage, HealthResponse, ServerMessage};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/ws", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.active_sessions.load(Ordering::SeqCst),
    })
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle one WebSocket connection end to end
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let session = state.build_session(tx.clone());
    let session_id = session.id();

    state.active_sessions.fetch_add(1, Ordering::SeqCst);
    tracing::info!(session_id = %session_id, "WebSocket client connected");

    // greeting goes through the same channel as alerts so ordering holds
    let greeting = ServerMessage::ConnectionEstablished {
        message: "Connected successfully".to_string(),
    };
    match serde_json::to_string(&greeting) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Greeting serialization failed");
        }
    }

    session.start().await;

    // Forward outbound messages (greeting, alerts, responses) to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages until close or error
    let recv_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    let reply = handle_client_message(&text);
                    let json = serde_json::to_string(&reply).unwrap_or_else(|e| {
                        tracing::error!(error = %e, "Reply serialization failed");
                        r#"{"type":"error","error":"Server error processing message"}"#
                            .to_string()
                    });
                    if recv_tx.send(json).is_err() {
                        break;
                    }
                }
                Ok(Message::Ping(data)) => {
                    // Pong is handled automatically by axum
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(session_id = %session_id, "WebSocket client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "WebSocket error");
                    break;
                }
                Ok(_) => {}
            }
        }
    });

    // Either side finishing ends the session
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    session.shutdown().await;
    state.active_sessions.fetch_sub(1, Ordering::SeqCst);
    tracing::info!(session_id = %session_id, "WebSocket session closed");
}

/// Map one inbound text frame to its reply. Malformed JSON gets an error
/// message rather than closing the connection.
fn handle_client_message(text: &str) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => ServerMessage::Response {
            message: msg.message,
        },
        Err(_) => ServerMessage::Error {
            error: "Invalid JSON received".to_string(),
        },
    }
}
