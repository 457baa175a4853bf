//! AppState construction extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;

use rt_backend::{CompletionBackend, OllamaBackend};
use rt_domain::config::{Config, ConfigSeverity};

use crate::room::registry::RoomRegistry;
use crate::state::AppState;

/// Validate the config, initialize every subsystem and return a
/// fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Generation backend ───────────────────────────────────────────
    let backend: Arc<dyn CompletionBackend> = Arc::new(
        OllamaBackend::from_config(&config.backend).context("initializing generation backend")?,
    );
    tracing::info!(
        backend = %backend.backend_id(),
        base_url = %config.backend.base_url,
        model = %config.backend.model,
        "generation backend ready"
    );

    // ── Room registry ────────────────────────────────────────────────
    let rooms = RoomRegistry::new(config.clone(), backend.clone());
    tracing::info!(
        workers_per_room = config.rooms.workers,
        "room registry ready"
    );

    Ok(AppState {
        config,
        backend,
        rooms,
    })
}
