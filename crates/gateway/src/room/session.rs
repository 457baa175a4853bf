//! Connected sessions and the friendly-name generators.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use rt_domain::event::ServerEvent;

/// Outbound channel to one connected client's WebSocket writer task.
pub type EventSink = mpsc::UnboundedSender<ServerEvent>;

/// One connected user in a room.
pub struct SessionHandle {
    pub user_id: String,
    /// Always stored with the leading `@` marker.
    pub nickname: String,
    /// The conversation thread this session owns.
    pub thread_id: String,
    pub joined_at: DateTime<Utc>,
    pub sink: EventSink,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Name & id generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Friendly animal names for generated nicknames.
const ANIMAL_NAMES: &[&str] = &["llama", "alpaca", "vicuna", "guanaco", "camel", "dromedary"];

/// Generate a friendly fallback nickname such as `@llama-42`.
pub fn friendly_nickname() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let animal = ANIMAL_NAMES[rng.random_range(0..ANIMAL_NAMES.len())];
    let number: u32 = rng.random_range(1..=999);
    format!("@{animal}-{number}")
}

/// Normalize a client-supplied nickname: trim it, fall back to a generated
/// one when empty, and guarantee the leading `@` marker.
pub fn normalize_nickname(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        friendly_nickname()
    } else if let Some(rest) = trimmed.strip_prefix('@') {
        format!("@{rest}")
    } else {
        format!("@{trimmed}")
    }
}

/// Generate an externally unguessable 8-character room id.
pub fn generate_room_id() -> String {
    use rand::Rng;

    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    const LEN: usize = 8;

    let mut rng = rand::rng();
    (0..LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
