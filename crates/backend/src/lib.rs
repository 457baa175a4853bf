pub mod ollama;
pub mod traits;
pub(crate) mod ndjson;
pub(crate) mod util;

// Re-exports for convenience.
pub use ollama::OllamaBackend;
pub use traits::{ChatMessage, CompletionBackend, CompletionRequest, ModelInfo};
