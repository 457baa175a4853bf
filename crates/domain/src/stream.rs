use std::pin::Pin;

use crate::error::Result;

/// A boxed async stream, used for backend streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// The shape of a streaming completion: a finite sequence of text deltas,
/// terminated by end-of-stream or a single error item.
pub type ChunkStream = BoxStream<'static, Result<String>>;
