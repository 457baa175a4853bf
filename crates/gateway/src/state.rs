use std::sync::Arc;

use rt_backend::CompletionBackend;
use rt_domain::config::Config;

use crate::room::registry::RoomRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The streaming completion service every room's workers call into.
    pub backend: Arc<dyn CompletionBackend>,
    /// All live rooms, each independently lockable.
    pub rooms: Arc<RoomRegistry>,
}
