use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rooms
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-room scheduling and history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    /// Worker loops started per room. Each worker runs one generation at a
    /// time; the fair queue is shared between them.
    #[serde(default = "d_workers")]
    pub workers: usize,
    /// Ring-buffer cap on every conversation thread.
    #[serde(default = "d_max_thread_history")]
    pub max_thread_history: usize,
    /// How many of the latest thread messages a job snapshots for the
    /// backend call.
    #[serde(default = "d_context_window")]
    pub context_window: usize,
    /// Rolling-window size for the wait-time estimator.
    #[serde(default = "d_eta_window")]
    pub eta_window: usize,
    /// Assumed per-job cost (seconds) until the estimator has samples.
    #[serde(default = "d_default_job_secs")]
    pub default_job_secs: u64,
    /// Fallback wakeup interval for idle workers.
    #[serde(default = "d_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            workers: d_workers(),
            max_thread_history: d_max_thread_history(),
            context_window: d_context_window(),
            eta_window: d_eta_window(),
            default_job_secs: d_default_job_secs(),
            poll_interval_ms: d_poll_interval_ms(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_workers() -> usize {
    1
}
fn d_max_thread_history() -> usize {
    50
}
fn d_context_window() -> usize {
    20
}
fn d_eta_window() -> usize {
    20
}
fn d_default_job_secs() -> u64 {
    15
}
fn d_poll_interval_ms() -> u64 {
    100
}
