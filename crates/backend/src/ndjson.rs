//! Shared newline-delimited-JSON streaming infrastructure.
//!
//! The Ollama chat API streams one JSON object per line.  The adapter
//! receives a `reqwest::Response`, buffers body chunks, splits them on
//! `\n`, and feeds each complete line to a parser closure that extracts
//! zero or one text deltas.
//!
//! This module extracts that shared logic into two functions:
//! - [`drain_lines`] -- pull complete lines from a buffer
//! - [`ndjson_response_stream`] -- build a `ChunkStream` from a response + parser closure

use rt_domain::stream::ChunkStream;

use crate::util::from_reqwest;

/// Extract complete lines from an NDJSON buffer.
///
/// The buffer is drained in-place: consumed bytes are removed and any
/// trailing partial line remains for the next call.  Blank lines are
/// skipped.
pub(crate) fn drain_lines(buffer: &mut String) -> Vec<String> {
    let mut lines = Vec::new();

    while let Some(pos) = buffer.find('\n') {
        let line: String = buffer.drain(..pos).collect();
        buffer.drain(..1); // remove the \n delimiter

        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }

    lines
}

/// Build a [`ChunkStream`] from an NDJSON `reqwest::Response` and a parser
/// closure.
///
/// The closure receives each complete line and returns the text delta it
/// carries, or `None` when the line holds no content (metadata lines,
/// unparsable garbage — both are skipped, matching the wire contract).
///
/// The stream automatically:
/// 1. Buffers incoming body chunks and drains complete lines
/// 2. Flushes a trailing partial line when the response body closes
/// 3. Terminates with a single `Err` item on transport failure
pub(crate) fn ndjson_response_stream<F>(response: reqwest::Response, mut parse_line: F) -> ChunkStream
where
    F: FnMut(&str) -> Option<String> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    for line in drain_lines(&mut buffer) {
                        if let Some(delta) = parse_line(&line) {
                            yield Ok(delta);
                        }
                    }
                }
                Ok(None) => {
                    // Body ended -- flush any unterminated final line.
                    let tail = buffer.trim();
                    if !tail.is_empty() {
                        if let Some(delta) = parse_line(tail) {
                            yield Ok(delta);
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
