//! Per-session WebSocket endpoint.
//!
//! Flow:
//! 1. Client connects to `/ws/{room_id}`; an unknown id closes the socket
//!    with a "room not found" frame.
//! 2. Client sends `join{nickname?}` and receives `joined{...}`.
//! 3. Bidirectional loop: inbound `message`/`typing` frames, outbound room
//!    events drained from the session's channel by a writer task.
//! 4. Socket close (either direction) removes the session.
//!
//! Malformed inbound frames are dropped without closing the connection.

use std::borrow::Cow;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use rt_domain::event::{ClientEvent, ServerEvent};

use crate::room::session::EventSink;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GET /ws/:room_id — upgrade to WebSocket.
pub async fn room_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Socket handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn handle_socket(socket: WebSocket, state: AppState, room_id: String) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    if state.rooms.get(&room_id).is_none() {
        tracing::debug!(room_id = %room_id, "ws connect to unknown room");
        let _ = ws_sink
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: Cow::from("room not found"),
            })))
            .await;
        return;
    }

    // Outbound channel: everything the room pushes at this session goes
    // through here, in order, drained by a single writer task.
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(_) => continue,
            };
            if ws_sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Reader loop: process inbound frames until the client goes away.
    let mut user_id: Option<String> = None;
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                let Ok(event) = serde_json::from_str::<ClientEvent>(&text) else {
                    tracing::debug!(room_id = %room_id, "ignoring unparsable frame");
                    continue;
                };
                handle_client_event(&state, &room_id, &mut user_id, &outbound_tx, event);
            }
            Message::Close(_) => break,
            // axum answers WS-level pings automatically.
            _ => {}
        }
    }

    // Cleanup: remove the session (idempotent against races with a failed
    // broadcast having already evicted us), then stop the writer.
    if let Some(user_id) = user_id {
        state.rooms.leave(&room_id, &user_id);
    }
    writer.abort();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn handle_client_event(
    state: &AppState,
    room_id: &str,
    user_id: &mut Option<String>,
    outbound_tx: &EventSink,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Join { nickname } => {
            if user_id.is_some() {
                // One session per connection; repeated joins are noise.
                return;
            }
            match state
                .rooms
                .join(room_id, nickname.as_deref(), outbound_tx.clone())
            {
                Ok(ack) => {
                    *user_id = Some(ack.user_id.clone());
                    let _ = outbound_tx.send(ServerEvent::Joined {
                        user_id: ack.user_id,
                        thread_id: ack.thread_id,
                        nickname: ack.nickname,
                        room_id: ack.room_id,
                    });
                }
                Err(e) => {
                    tracing::warn!(room_id = %room_id, error = %e, "join failed");
                }
            }
        }

        ClientEvent::Message { content, thread_id } => {
            let Some(user_id) = user_id.as_deref() else {
                return;
            };
            match state
                .rooms
                .enqueue_message(room_id, user_id, &content, thread_id.as_deref())
            {
                Ok(Some(ack)) => {
                    let _ = outbound_tx.send(ServerEvent::Enqueued {
                        job_id: ack.job_id,
                        position: ack.position,
                        eta_seconds: ack.eta_seconds,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(room_id = %room_id, error = %e, "enqueue failed");
                }
            }
        }

        ClientEvent::Typing {
            is_typing,
            thread_id,
        } => {
            let Some(user_id) = user_id.as_deref() else {
                return;
            };
            state
                .rooms
                .typing(room_id, user_id, is_typing, thread_id.as_deref());
        }
    }
}
