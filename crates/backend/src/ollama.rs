//! Ollama adapter.
//!
//! Talks to a local (or remote) Ollama server over its native API:
//! `POST /api/chat` with `stream: true` for newline-delimited JSON deltas,
//! `GET /api/tags` for the installed-model list and as the connectivity
//! probe.

use serde_json::Value;

use rt_domain::config::BackendConfig;
use rt_domain::error::{Error, Result};
use rt_domain::stream::ChunkStream;

use crate::ndjson::ndjson_response_stream;
use crate::traits::{CompletionBackend, CompletionRequest, ModelInfo};
use crate::util::from_reqwest;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A [`CompletionBackend`] adapter for the Ollama HTTP API.
pub struct OllamaBackend {
    id: String,
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new adapter from the deserialized backend config.
    ///
    /// The client carries the configured total-request timeout, so a stalled
    /// generation surfaces as a timeout error on the delta stream rather
    /// than hanging a worker forever.
    pub fn from_config(cfg: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "ollama".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            default_model: cfg.model.clone(),
            client,
        })
    }

    /// Resolve the effective model name for this request.
    fn effective_model(&self, req: &CompletionRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &CompletionRequest) -> Value {
        serde_json::json!({
            "model": self.effective_model(req),
            "messages": req.messages,
            "stream": true,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Line parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extract the text delta from one streamed chat line.
///
/// Lines look like `{"model":...,"message":{"role":"assistant","content":"He"},
/// "done":false}`.  The final line has `done: true` and an empty content.
/// Unparsable lines and lines without content are skipped.
fn parse_chat_line(line: &str) -> Option<String> {
    let v: Value = serde_json::from_str(line).ok()?;
    let content = v.get("message")?.get("content")?.as_str()?;
    if content.is_empty() {
        return None;
    }
    Some(content.to_string())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl CompletionBackend for OllamaBackend {
    async fn stream_chat(&self, req: CompletionRequest) -> Result<ChunkStream> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_chat_body(&req);

        tracing::debug!(
            backend = %self.id,
            model = %self.effective_model(&req),
            messages = req.messages.len(),
            "ollama stream request"
        );

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.unwrap_or_default();
            return Err(Error::Backend {
                backend: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(ndjson_response_stream(resp, parse_chat_line))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);

        let resp = self.client.get(&url).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Backend {
                backend: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let models = resp_json
            .get("models")
            .and_then(|m| m.as_array())
            .ok_or_else(|| Error::Backend {
                backend: self.id.clone(),
                message: "missing 'models' array in tags response".into(),
            })?;

        Ok(models
            .iter()
            .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
            .map(|name| ModelInfo { name: name.to_string() })
            .collect())
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(from_reqwest)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Backend {
                backend: self.id.clone(),
                message: format!("HTTP {}", resp.status().as_u16()),
            })
        }
    }

    fn backend_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
