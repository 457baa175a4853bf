//! Per-job cancellation tokens.
//!
//! Each streaming job registers a `CancelToken` that the worker checks
//! between chunks. Nothing in the default flow triggers it — a user who
//! disconnects mid-generation lets the backend call finish and the result
//! is discarded — but the hook is here for callers that want hard aborts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A cancellation token checked by the streaming loop between chunks.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the active cancellation token of every streaming job, keyed by
/// job id.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register a new cancel token for a job.
    pub fn register(&self, job_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(job_id.to_owned(), token.clone());
        token
    }

    /// Cancel a streaming job. Returns true if a token was found.
    pub fn cancel(&self, job_id: &str) -> bool {
        if let Some(token) = self.tokens.lock().get(job_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// Remove the token for a job (called when streaming completes).
    pub fn remove(&self, job_id: &str) {
        self.tokens.lock().remove(job_id);
    }

    /// Check if a job is currently streaming.
    pub fn is_streaming(&self, job_id: &str) -> bool {
        self.tokens.lock().contains_key(job_id)
    }
}
