use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// One pending generation request.
///
/// The message window is snapshotted at submission time, so edits to the
/// thread after enqueue (new messages, eviction) do not affect a job that
/// is already waiting. A job leaves the pending queue exactly once: when a
/// worker dispatches it, or when its owner's session is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub room_id: String,
    pub thread_id: String,
    pub user_id: String,
    /// Last N thread messages at submission time, oldest first.
    pub messages: Vec<Message>,
    pub enqueued_at: DateTime<Utc>,
}
