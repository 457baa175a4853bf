use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the streaming completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the Ollama-compatible API.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Model identifier sent with every completion request.
    #[serde(default = "d_model")]
    pub model: String,
    /// Total per-request ceiling. A generation that exceeds this surfaces
    /// to the room as a recovered timeout chunk, never a crashed worker.
    #[serde(default = "d_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            model: d_model(),
            timeout_secs: d_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://localhost:11434".into()
}
fn d_model() -> String {
    "gemma3:4b".into()
}
fn d_timeout() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_config_defaults() {
        let cfg = BackendConfig::default();
        assert_eq!(cfg.base_url, "http://localhost:11434");
        assert_eq!(cfg.model, "gemma3:4b");
        assert_eq!(cfg.timeout_secs, 120);
    }

    #[test]
    fn backend_config_parses_overrides() {
        let toml_str = r#"
            base_url = "http://gpu-box:11434"
            model = "llama3.2"
            timeout_secs = 300
        "#;
        let cfg: BackendConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.base_url, "http://gpu-box:11434");
        assert_eq!(cfg.model, "llama3.2");
        assert_eq!(cfg.timeout_secs, 300);
    }
}
