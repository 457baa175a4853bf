//! Fair job queue with round-robin-by-submitter scheduling.
//!
//! The queue holds every pending generation request for one room. Dispatch
//! walks a rotating order of user ids so that a user flooding requests gets
//! at most one dispatch per full cycle, while each user's own jobs stay in
//! strict FIFO order. The struct itself is not synchronized — it lives
//! inside the owning room's mutex.

use std::collections::VecDeque;

use rt_domain::job::Job;

pub struct FairQueue {
    pending: VecDeque<Job>,
    /// Rotating turn order of user ids. De-duplicated; a user appears at
    /// most once regardless of how many jobs they have pending.
    rr_order: VecDeque<String>,
}

impl Default for FairQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FairQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            rr_order: VecDeque::new(),
        }
    }

    /// Make sure a user holds a slot in the turn order (no-op if present).
    pub fn register_user(&mut self, user_id: &str) {
        if !self.rr_order.iter().any(|u| u == user_id) {
            self.rr_order.push_back(user_id.to_string());
        }
    }

    /// Append a job and return the submitter's 1-based position among their
    /// *own* currently pending jobs.
    ///
    /// Jobs are append-only, so after the push every other pending job of
    /// the same user was enqueued earlier; counting them (self included)
    /// yields the position.
    pub fn enqueue(&mut self, job: Job) -> usize {
        self.register_user(&job.user_id);
        let user_id = job.user_id.clone();
        self.pending.push_back(job);

        self.pending
            .iter()
            .filter(|j| j.user_id == user_id)
            .count()
    }

    /// Dispatch the next job under round-robin-with-skip.
    ///
    /// Walks the turn order from its head for at most one full pass: each
    /// popped user is re-appended to the tail whether or not they had a job
    /// (an empty turn is still a consumed turn), and the first user found
    /// with a pending job surrenders their oldest one.
    pub fn next_job(&mut self) -> Option<Job> {
        if self.pending.is_empty() {
            return None;
        }

        let mut attempts = 0;
        while attempts < self.rr_order.len() {
            let user_id = self.rr_order.pop_front()?;

            if let Some(idx) = self.pending.iter().position(|j| j.user_id == user_id) {
                let job = self.pending.remove(idx);
                self.rr_order.push_back(user_id);
                return job;
            }

            // No jobs for this user; their turn is spent.
            self.rr_order.push_back(user_id);
            attempts += 1;
        }

        None
    }

    /// Drop every pending job of a departing user and free their turn slot.
    pub fn purge_user(&mut self, user_id: &str) {
        self.pending.retain(|j| j.user_id != user_id);
        self.rr_order.retain(|u| u != user_id);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
