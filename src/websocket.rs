//! WebSocket notification push
//!
//! Clients connect to `/ws?token=<jwt>`. After the upgrade the session forwards every
//! notification addressed to the authenticated user and answers `ping` and
//! `mark_read` messages.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::auth::authenticate;
use crate::error::Result;
use crate::models::User;
use crate::notify::Notification;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// Authenticate, then upgrade
pub async fn handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse> {
    let user = authenticate(&state, &params.token).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: User) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before announcing the session so nothing published after
    // `connected` is missed.
    let mut notifications = state.notifier.subscribe();

    tracing::info!(user_id = %user.id, "websocket connected");
    if !send(&mut sender, &ServerMessage::Connected { user_id: user.id }).await {
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                };

                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Ping) => ServerMessage::Pong,
                    Ok(ClientMessage::MarkRead { notification_id }) => {
                        match state
                            .store
                            .mark_notification_read(notification_id, user.id)
                            .await
                        {
                            Ok(()) => ServerMessage::Marked { notification_id },
                            Err(e) => ServerMessage::Error {
                                message: e.to_string(),
                            },
                        }
                    }
                    Err(e) => ServerMessage::Error {
                        message: format!("Invalid message: {}", e),
                    },
                };
                if !send(&mut sender, &reply).await {
                    break;
                }
            }
            event = notifications.recv() => {
                match event {
                    Ok(notification) if notification.user_id == user.id => {
                        if !send(&mut sender, &ServerMessage::Notification { notification }).await {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id = %user.id, skipped, "websocket subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!(user_id = %user.id, "websocket disconnected");
}

/// Send one message; false once the socket is gone
async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to encode message: {}", e);
            return true;
        }
    };
    match sender.send(Message::Text(text)).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Failed to send message: {}", e);
            false
        }
    }
}

/// Messages from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    /// Mark one of the user's notifications read
    MarkRead { notification_id: Uuid },
}

/// Messages from server to client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session is live
    Connected { user_id: Uuid },
    /// A new notification for this user
    Notification { notification: Notification },
    /// A `mark_read` succeeded
    Marked { notification_id: Uuid },
    Pong,
    /// Error occurred
    Error { message: String },
}
