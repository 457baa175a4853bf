mod backend;
mod rooms;
mod server;

pub use backend::*;
pub use rooms::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        if self.backend.base_url.is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.base_url".into(),
                message: "must not be empty".into(),
            });
        } else if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.base_url".into(),
                message: format!("'{}' is not an http(s) URL", self.backend.base_url),
            });
        }

        if self.backend.model.is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.model".into(),
                message: "must not be empty".into(),
            });
        }

        if self.backend.timeout_secs == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.timeout_secs".into(),
                message: "must be at least 1".into(),
            });
        }

        if self.rooms.workers == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "rooms.workers".into(),
                message: "at least one worker per room is required".into(),
            });
        }

        if self.rooms.max_thread_history == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "rooms.max_thread_history".into(),
                message: "must be at least 1".into(),
            });
        }

        if self.rooms.context_window > self.rooms.max_thread_history {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "rooms.context_window".into(),
                message: format!(
                    "window of {} exceeds max_thread_history of {} — the extra slots can never fill",
                    self.rooms.context_window, self.rooms.max_thread_history
                ),
            });
        }

        if self.rooms.eta_window == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "rooms.eta_window".into(),
                message: "must be at least 1".into(),
            });
        }

        issues
    }
}
