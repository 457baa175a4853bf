//! Per-conversation message history with bounded retention.

use std::collections::HashMap;
use std::collections::VecDeque;

use rt_domain::message::Message;

/// All conversation threads of one room, keyed by thread id.
///
/// Every thread is append-only except for capacity eviction: once a thread
/// exceeds `max_history` messages the oldest are dropped, oldest first.
/// Order is never otherwise disturbed.
pub struct ThreadStore {
    threads: HashMap<String, VecDeque<Message>>,
    max_history: usize,
}

impl ThreadStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            threads: HashMap::new(),
            max_history,
        }
    }

    /// Create an empty thread if it does not exist yet.
    pub fn ensure(&mut self, thread_id: &str) {
        self.threads.entry(thread_id.to_string()).or_default();
    }

    /// Append a message, evicting from the front past the capacity bound.
    pub fn append(&mut self, thread_id: &str, message: Message) {
        let thread = self.threads.entry(thread_id.to_string()).or_default();
        thread.push_back(message);
        while thread.len() > self.max_history {
            thread.pop_front();
        }
    }

    /// Clone the last `n` messages of a thread, oldest first. Empty when
    /// the thread does not exist.
    pub fn window(&self, thread_id: &str, n: usize) -> Vec<Message> {
        match self.threads.get(thread_id) {
            Some(thread) => {
                let skip = thread.len().saturating_sub(n);
                thread.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Full snapshot of one thread, oldest first.
    pub fn snapshot(&self, thread_id: &str) -> Option<Vec<Message>> {
        self.threads
            .get(thread_id)
            .map(|t| t.iter().cloned().collect())
    }

    pub fn len(&self, thread_id: &str) -> usize {
        self.threads.get(thread_id).map_or(0, |t| t.len())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_creates_thread_on_demand() {
        let mut store = ThreadStore::new(50);
        store.append("t1", Message::user("hi"));
        assert_eq!(store.len("t1"), 1);
    }

    #[test]
    fn bounded_at_exactly_capacity_with_most_recent_kept() {
        let mut store = ThreadStore::new(50);
        for i in 0..75 {
            store.append("t1", Message::user(format!("msg-{i}")));
        }

        let snapshot = store.snapshot("t1").unwrap();
        assert_eq!(snapshot.len(), 50);
        // The 50 most recent, oldest first.
        assert_eq!(snapshot[0].content, "msg-25");
        assert_eq!(snapshot[49].content, "msg-74");
    }

    #[test]
    fn order_is_preserved_across_eviction() {
        let mut store = ThreadStore::new(3);
        for i in 0..5 {
            store.append("t1", Message::user(format!("{i}")));
        }
        let snapshot = store.snapshot("t1").unwrap();
        let contents: Vec<&str> = snapshot.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["2", "3", "4"]);
    }

    #[test]
    fn window_returns_last_n() {
        let mut store = ThreadStore::new(50);
        for i in 0..30 {
            store.append("t1", Message::user(format!("{i}")));
        }
        let window = store.window("t1", 20);
        assert_eq!(window.len(), 20);
        assert_eq!(window[0].content, "10");
        assert_eq!(window[19].content, "29");
    }

    #[test]
    fn window_shorter_thread_returns_all() {
        let mut store = ThreadStore::new(50);
        store.append("t1", Message::user("only"));
        assert_eq!(store.window("t1", 20).len(), 1);
    }

    #[test]
    fn window_of_missing_thread_is_empty() {
        let store = ThreadStore::new(50);
        assert!(store.window("nope", 20).is_empty());
        assert!(store.snapshot("nope").is_none());
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut store = ThreadStore::new(50);
        store.ensure("t1");
        store.append("t1", Message::user("hi"));
        store.ensure("t1");
        assert_eq!(store.len("t1"), 1);
    }
}
