//! NDJSON streaming parser for Ollama generate responses.
//!
//! Converts a raw `reqwest` byte stream into `GenerateChunk` values.
//! Ollama emits one JSON object per line; lines (and multi-byte characters)
//! may be split across network frames, so raw bytes are buffered and only
//! complete lines are decoded.

use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::OllamaError;
use crate::types::GenerateLineRaw;

/// A single fragment from a streaming generate call.
#[derive(Debug, Clone)]
pub struct GenerateChunk {
    /// The text fragment for this line.
    pub response: String,
    /// Whether this was the final line.
    pub done: bool,
}

/// Stream adapter that converts raw NDJSON bytes into `GenerateChunk` values.
pub struct GenerateStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: Vec<u8>,
}

impl GenerateStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: Vec::new(),
        }
    }
}

impl Stream for GenerateStream {
    type Item = Result<GenerateChunk, OllamaError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(chunk) = try_parse_line(&mut this.buffer) {
                return Poll::Ready(Some(chunk));
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(OllamaError::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    // Last line may arrive without a trailing newline
                    if this.buffer.iter().all(u8::is_ascii_whitespace) {
                        return Poll::Ready(None);
                    }
                    this.buffer.push(b'\n');
                    return Poll::Ready(try_parse_line(&mut this.buffer));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Try to extract and parse a complete NDJSON line from the buffer.
/// Returns `None` if no complete line is available yet.
fn try_parse_line(buffer: &mut Vec<u8>) -> Option<Result<GenerateChunk, OllamaError>> {
    loop {
        let newline_pos = buffer.iter().position(|b| *b == b'\n')?;
        let raw_line: Vec<u8> = buffer.drain(..=newline_pos).collect();

        let line = match std::str::from_utf8(&raw_line) {
            Ok(text) => text.trim(),
            Err(e) => {
                return Some(Err(OllamaError::Parse(format!(
                    "Invalid UTF-8 in stream: {}",
                    e
                ))))
            }
        };

        if line.is_empty() {
            continue;
        }

        return Some(match serde_json::from_str::<GenerateLineRaw>(line) {
            Ok(raw) => match raw.error {
                Some(error) => Err(OllamaError::Api(error)),
                None => Ok(GenerateChunk {
                    response: raw.response,
                    done: raw.done,
                }),
            },
            Err(e) => Err(OllamaError::Parse(format!(
                "Failed to parse stream line: {} (line: {})",
                e,
                line.chars().take(200).collect::<String>()
            ))),
        });
    }
}
