//! WebSocket API handler.
//!
//! Every connection becomes an engine observer as soon as it opens and
//! receives all engine events. Triggers and commands additionally require
//! a `register` message carrying a token issued by `POST /bind`.

use crate::AppState;
use announcer_engine::{EventSink, SubscriptionId};
use announcer_types::{context_from_json, ControlAction, EngineEvent, ItemSummary, Snapshot};
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        ConnectInfo, Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound frames buffered per connection before events are dropped.
const CONNECTION_BUFFER: usize = 256;

/// How long a closing connection may spend flushing queued frames.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Incoming WebSocket message types.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    Register {
        #[serde(default)]
        token: Option<String>,
    },
    Trigger {
        #[serde(default)]
        trigger: Option<String>,
        #[serde(default)]
        context: Value,
    },
    Command {
        #[serde(default)]
        action: Option<String>,
    },
    Snapshot,
}

/// Replies addressed to a single connection.
///
/// Engine events are forwarded as serialized [`EngineEvent`]s and share the
/// same `type`-tagged layout.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    RegisterResponse {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Ack {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        triggered: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        enqueued: Option<Vec<ItemSummary>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Snapshot(Snapshot),
    Error {
        error: String,
    },
}

impl OutgoingMessage {
    fn ack_error(error: impl Into<String>) -> Self {
        OutgoingMessage::Ack {
            ok: false,
            triggered: None,
            enqueued: None,
            action: None,
            error: Some(error.into()),
        }
    }
}

/// Forwards engine events into one connection's outbound buffer.
struct ConnectionSink {
    connection_id: Uuid,
    tx: mpsc::Sender<String>,
}

impl EventSink for ConnectionSink {
    fn deliver(&self, event: &EngineEvent) {
        match serde_json::to_string(event) {
            Ok(json) => {
                if let Err(e) = self.tx.try_send(json) {
                    tracing::warn!(
                        connection = %self.connection_id,
                        event = event.kind(),
                        "dropping engine event for slow consumer: {}",
                        e
                    );
                }
            }
            Err(e) => tracing::error!("failed to serialize engine event: {}", e),
        }
    }
}

/// WebSocket handler: `GET /ws`.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Sends a JSON-serialized reply over the connection's sender channel.
fn send_message(tx: &mpsc::Sender<String>, message: &OutgoingMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            if let Err(e) = tx.try_send(json) {
                tracing::warn!("failed to queue WebSocket reply: {}", e);
            }
        }
        Err(e) => {
            tracing::error!("failed to serialize WebSocket reply: {}", e);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Per-connection state owned by the reader loop.
struct Connection {
    id: Uuid,
    token: Option<String>,
    tx: mpsc::Sender<String>,
}

impl Connection {
    fn is_registered(&self, state: &AppState) -> bool {
        self.token
            .as_deref()
            .is_some_and(|token| state.sessions.validate(token))
    }

    fn handle(&mut self, state: &AppState, incoming: IncomingMessage) -> Flow {
        match incoming {
            IncomingMessage::Register { token } => self.register(state, token),
            IncomingMessage::Trigger { trigger, context } => {
                if !self.is_registered(state) {
                    send_message(&self.tx, &OutgoingMessage::ack_error("not registered"));
                    return Flow::Continue;
                }
                let Some(trigger) = trigger.filter(|t| !t.trim().is_empty()) else {
                    send_message(&self.tx, &OutgoingMessage::ack_error("trigger required"));
                    return Flow::Continue;
                };

                let context = context_from_json(&context);
                let reply = match state.engine.dispatch(&trigger, &context) {
                    Ok(items) => OutgoingMessage::Ack {
                        ok: true,
                        enqueued: Some(items.iter().map(|item| item.summary()).collect()),
                        triggered: Some(trigger),
                        action: None,
                        error: None,
                    },
                    Err(e) => OutgoingMessage::ack_error(e.to_string()),
                };
                send_message(&self.tx, &reply);
                Flow::Continue
            }
            IncomingMessage::Command { action } => {
                if !self.is_registered(state) {
                    send_message(&self.tx, &OutgoingMessage::ack_error("not registered"));
                    return Flow::Continue;
                }
                let parsed = action.as_deref().unwrap_or("").parse::<ControlAction>();
                let reply = match parsed {
                    Ok(action) => {
                        state.engine.controller().apply(action);
                        tracing::info!(connection = %self.id, action = %action, "control action applied");
                        OutgoingMessage::Ack {
                            ok: true,
                            triggered: None,
                            enqueued: None,
                            action: Some(action.as_str().to_string()),
                            error: None,
                        }
                    }
                    Err(_) => OutgoingMessage::ack_error("unknown command"),
                };
                send_message(&self.tx, &reply);
                Flow::Continue
            }
            IncomingMessage::Snapshot => {
                let snapshot = state.engine.controller().snapshot();
                send_message(&self.tx, &OutgoingMessage::Snapshot(snapshot));
                Flow::Continue
            }
        }
    }

    fn register(&mut self, state: &AppState, token: Option<String>) -> Flow {
        let attached = token
            .as_deref()
            .map(|token| state.sessions.attach(token, self.id));

        match (token, attached) {
            (Some(token), Some(Ok(_))) => {
                if let Some(previous) = self.token.replace(token.clone()) {
                    if previous != token {
                        state.sessions.detach(&previous, self.id);
                    }
                }
                tracing::info!(connection = %self.id, token = %token, "websocket registered");
                send_message(
                    &self.tx,
                    &OutgoingMessage::RegisterResponse {
                        ok: true,
                        error: None,
                    },
                );
                Flow::Continue
            }
            _ => {
                tracing::warn!(connection = %self.id, "websocket registration with invalid token");
                send_message(
                    &self.tx,
                    &OutgoingMessage::RegisterResponse {
                        ok: false,
                        error: Some("invalid token".to_string()),
                    },
                );
                Flow::Close
            }
        }
    }
}

/// Handles the WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();

    // Bounded so a stalled client cannot grow memory without limit. Overflow
    // drops events for that client only.
    let (tx, mut rx) = mpsc::channel::<String>(CONNECTION_BUFFER);

    let mut connection = Connection {
        id: Uuid::new_v4(),
        token: None,
        tx: tx.clone(),
    };

    let subscription: SubscriptionId = state.engine.controller().subscribe(Arc::new(ConnectionSink {
        connection_id: connection.id,
        tx,
    }));
    tracing::info!(connection = %connection.id, remote_addr = %addr, "websocket connected");

    // Forward queued frames to the socket; close once every sender is gone.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                return;
            }
        }
        let _ = sender.send(AxumMessage::Close(None)).await;
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            AxumMessage::Text(text) => match serde_json::from_str::<IncomingMessage>(text.as_str()) {
                Ok(incoming) => {
                    if connection.handle(&state, incoming) == Flow::Close {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(connection = %connection.id, "failed to parse incoming WebSocket message: {}", e);
                    send_message(
                        &connection.tx,
                        &OutgoingMessage::Error {
                            error: format!("invalid message: {}", e),
                        },
                    );
                }
            },
            AxumMessage::Close(_) => break,
            _ => {}
        }
    }

    state.engine.controller().unsubscribe(subscription);
    if let Some(token) = connection.token.as_deref() {
        state.sessions.detach(token, connection.id);
    }

    let connection_id = connection.id;
    drop(connection);
    if tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    tracing::info!(connection = %connection_id, remote_addr = %addr, "websocket disconnected");
}
