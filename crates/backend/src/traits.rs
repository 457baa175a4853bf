use rt_domain::error::Result;
use rt_domain::message::{Message, Role};
use rt_domain::stream::ChunkStream;
use serde::Serialize;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One role+content pair as the backend wire format expects it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

/// A backend-agnostic streaming completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// The message window to complete against, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Model identifier override. When `None`, the backend uses its default.
    pub model: Option<String>,
}

/// One model the backend can serve.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core backend trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The generation-service collaborator.
///
/// Implementations translate between our internal types and the wire format
/// of a concrete completion API.  `stream_chat` must be invoked at most once
/// per job; the returned stream is a finite sequence of text deltas ended by
/// end-of-stream or a single error item.
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Start a streaming completion and return the delta stream.
    async fn stream_chat(&self, req: CompletionRequest) -> Result<ChunkStream>;

    /// List the models the backend currently serves.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Cheap connectivity probe.
    async fn health(&self) -> Result<()>;

    /// A unique identifier for this backend instance.
    fn backend_id(&self) -> &str;
}
