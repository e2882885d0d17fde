//! # JSON Lines Framing
//!
//! The upstream answer is newline-delimited JSON. Network chunks do not line up
//! with line boundaries, so bytes are buffered until a full line is available.
//! Buffering raw bytes (not text) keeps multi-byte characters that straddle two
//! chunks intact.

use super::{EventStream, UpstreamEvent};
use crate::{constants::DEFAULT_STREAM_ERROR, errors::ChatError};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::{fmt::Display, mem};
use tracing::{debug, warn};

/// Accumulates bytes and hands out complete, non-empty lines.
#[derive(Debug, Default)]
pub struct JsonLineBuffer {
    buffer: Vec<u8>,
}

impl JsonLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let rest = self.buffer.split_off(newline_pos + 1);
            let line = mem::replace(&mut self.buffer, rest);
            if let Some(line) = decode_line(&line) {
                lines.push(line);
            }
        }
        lines
    }

    /// Returns the trailing partial line, if any, once the stream has ended.
    pub fn flush(&mut self) -> Option<String> {
        let remaining = mem::take(&mut self.buffer);
        decode_line(&remaining)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Parses one line of the upstream stream.
///
/// Returns `None` for malformed lines and unknown event types; both are logged
/// and skipped without ending the stream.
pub fn parse_event_line(line: &str) -> Option<UpstreamEvent> {
    let raw: RawEvent = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, line = %line, "Skipping malformed chat stream line");
            return None;
        }
    };

    match raw.kind.as_str() {
        "text" => {
            let token = match raw.data {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            Some(UpstreamEvent::Text(token))
        }
        "metadata" => Some(UpstreamEvent::Metadata(raw.data)),
        "error" => Some(UpstreamEvent::Error(error_message(&raw.data))),
        other => {
            debug!(kind = %other, "Ignoring unknown chat stream event type");
            None
        }
    }
}

fn error_message(data: &Value) -> String {
    match data {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_STREAM_ERROR)
            .to_string(),
        _ => DEFAULT_STREAM_ERROR.to_string(),
    }
}

/// Turns a raw byte stream into a stream of upstream events.
///
/// A transport error is yielded once as `ChatError::StreamInterrupted` and
/// ends the stream.
pub fn decode_event_stream<S, E>(byte_stream: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_stream = Box::pin(byte_stream);
        let mut buffer = JsonLineBuffer::new();
        let mut interrupted = false;

        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for line in buffer.feed(&bytes) {
                        if let Some(event) = parse_event_line(&line) {
                            yield Ok(event);
                        }
                    }
                }
                Err(e) => {
                    yield Err(ChatError::StreamInterrupted(e.to_string()));
                    interrupted = true;
                    break;
                }
            }
        }

        if !interrupted {
            if let Some(line) = buffer.flush() {
                if let Some(event) = parse_event_line(&line) {
                    yield Ok(event);
                }
            }
        }
    })
}
