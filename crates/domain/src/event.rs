//! Wire protocol for the per-session WebSocket channel.
//!
//! Every frame is a JSON object tagged by a `type` field. Inbound and
//! outbound vocabularies are separate closed enums; a frame that does not
//! deserialize into [`ClientEvent`] is dropped by the connection handler
//! without closing the socket.

use serde::{Deserialize, Serialize};

/// Events a connected client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Join handshake. Must be the first event on a connection.
    #[serde(rename = "join")]
    Join {
        #[serde(default)]
        nickname: Option<String>,
    },

    /// A user message for the sender's own thread.
    #[serde(rename = "message")]
    Message {
        content: String,
        #[serde(default)]
        thread_id: Option<String>,
    },

    /// Typing indicator, relayed to the rest of the room.
    #[serde(rename = "typing")]
    Typing {
        #[serde(default)]
        is_typing: bool,
        #[serde(default)]
        thread_id: Option<String>,
    },
}

/// Events the server pushes to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Join confirmation, sent only to the joining session.
    #[serde(rename = "joined")]
    Joined {
        user_id: String,
        thread_id: String,
        nickname: String,
        room_id: String,
    },

    #[serde(rename = "user_joined")]
    UserJoined { user_id: String, nickname: String },

    /// Queue acknowledgment, sent only to the submitter.
    #[serde(rename = "enqueued")]
    Enqueued {
        job_id: String,
        position: usize,
        eta_seconds: u64,
    },

    #[serde(rename = "message_added")]
    MessageAdded {
        user_id: String,
        thread_id: String,
        content: String,
        nickname: String,
    },

    #[serde(rename = "typing")]
    Typing {
        user_id: String,
        thread_id: String,
        is_typing: bool,
        nickname: String,
    },

    #[serde(rename = "generation_start")]
    GenerationStart {
        user_id: String,
        thread_id: String,
        nickname: String,
    },

    /// One incremental text delta of a streaming response.
    #[serde(rename = "chunk")]
    Chunk {
        thread_id: String,
        user_id: String,
        delta: String,
    },

    #[serde(rename = "generation_done")]
    GenerationDone { user_id: String, thread_id: String },

    #[serde(rename = "user_left")]
    UserLeft { user_id: String },
}
