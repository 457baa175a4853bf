pub mod rooms;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Everything is public: rooms are reachable only through their
/// unguessable ids, and authentication is explicitly out of scope.
pub fn router() -> Router<AppState> {
    Router::new()
        // Liveness + backend probe
        .route("/healthz", get(rooms::healthz))
        // Rooms
        .route("/api/rooms", post(rooms::create_room))
        .route("/api/rooms/:room_id", get(rooms::room_status))
        // Models served by the backend
        .route("/api/models", get(rooms::list_models))
        // Per-session realtime channel
        .route("/ws/:room_id", get(ws::room_ws))
}
