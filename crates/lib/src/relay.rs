//! # Chat Relay Pipeline
//!
//! Forwards the upstream answer to the browser frame by frame while
//! accumulating it. When the upstream finishes cleanly with a non-empty answer
//! the turn is recorded and its log id is sent as the final frame.

use crate::{
    constants::{ERROR_SENTINEL, META_SENTINEL, QA_LOG_CD_SENTINEL},
    errors::{ChatError, StoreError},
    store::QaStore,
    turns::TurnTracker,
    types::{ChatRequest, TurnRecord},
    upstream::{ChatUpstream, UpstreamEvent},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{pin::Pin, sync::Arc};
use tracing::{debug, error, warn};

/// How frames are written to the response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// One `{"type": ..., "data": ...}` JSON object per line.
    #[default]
    Envelope,
    /// Text-only JSON lines with in-band markers for metadata, the log id and
    /// errors. Understood by the bundled chat page.
    Sentinel,
}

/// One unit of output sent to the browser.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayFrame {
    Text(String),
    Metadata(Value),
    Error(String),
    LogId(i64),
}

impl RelayFrame {
    /// Serializes the frame as a newline-terminated chunk.
    pub fn encode(&self, format: WireFormat) -> String {
        match (self, format) {
            (RelayFrame::Text(token), _) => line(json!({"type": "text", "data": token})),
            (RelayFrame::Metadata(data), WireFormat::Envelope) => {
                line(json!({"type": "metadata", "data": data}))
            }
            (RelayFrame::Metadata(data), WireFormat::Sentinel) => {
                line(json!({"type": "text", "data": format!("{META_SENTINEL}{data}")}))
            }
            (RelayFrame::Error(message), WireFormat::Envelope) => {
                line(json!({"type": "error", "data": message}))
            }
            (RelayFrame::Error(message), WireFormat::Sentinel) => {
                format!("data: {ERROR_SENTINEL}{message}\n\n")
            }
            (RelayFrame::LogId(id), WireFormat::Envelope) => {
                line(json!({"type": "log_id", "data": id}))
            }
            (RelayFrame::LogId(id), WireFormat::Sentinel) => {
                format!("{QA_LOG_CD_SENTINEL}{id}\n\n")
            }
        }
    }
}

fn line(value: Value) -> String {
    format!("{value}\n")
}

/// A question from an authenticated user.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub user_cd: i64,
    pub chat: ChatRequest,
}

pub type FrameStream = Pin<Box<dyn Stream<Item = RelayFrame> + Send>>;

#[derive(Debug, Clone)]
pub struct ChatRelay {
    upstream: Arc<dyn ChatUpstream>,
    store: Arc<dyn QaStore>,
    turns: Arc<TurnTracker>,
    wire_format: WireFormat,
}

impl ChatRelay {
    pub fn new(
        upstream: Arc<dyn ChatUpstream>,
        store: Arc<dyn QaStore>,
        turns: Arc<TurnTracker>,
        wire_format: WireFormat,
    ) -> Self {
        Self {
            upstream,
            store,
            turns,
            wire_format,
        }
    }

    pub fn wire_format(&self) -> WireFormat {
        self.wire_format
    }

    /// Connects to the upstream and returns the frame stream.
    ///
    /// Connection failures are returned before any frame exists. Once the
    /// stream is handed out it never fails: upstream errors become an
    /// `Error` frame and persistence failures are only logged.
    pub async fn open(&self, request: RelayRequest) -> Result<FrameStream, ChatError> {
        let mut events = self.upstream.stream_chat(&request.chat).await?;
        let store = self.store.clone();
        let turns = self.turns.clone();

        Ok(Box::pin(async_stream::stream! {
            let mut guard = DisconnectGuard::new(&request.chat.conversation_id);
            let mut answer = String::new();
            let mut failed = false;

            while let Some(event) = events.next().await {
                match event {
                    Ok(UpstreamEvent::Text(token)) => {
                        answer.push_str(&token);
                        yield RelayFrame::Text(token);
                    }
                    Ok(UpstreamEvent::Metadata(data)) => {
                        yield RelayFrame::Metadata(data);
                    }
                    Ok(UpstreamEvent::Error(message)) => {
                        warn!(
                            conversation_id = %request.chat.conversation_id,
                            error = %message,
                            "Upstream reported an error"
                        );
                        failed = true;
                        yield RelayFrame::Error(message);
                        break;
                    }
                    Err(e) => {
                        error!(
                            conversation_id = %request.chat.conversation_id,
                            error = %e,
                            "Upstream stream failed"
                        );
                        failed = true;
                        yield RelayFrame::Error(e.to_string());
                        break;
                    }
                }
            }
            drop(events);

            let mut log_id = None;
            if failed {
                debug!(conversation_id = %request.chat.conversation_id, "Turn not saved after upstream error");
            } else if answer.is_empty() {
                debug!(conversation_id = %request.chat.conversation_id, "Turn not saved: empty answer");
            } else {
                match save_turn(store.as_ref(), &turns, &request, answer).await {
                    Ok(id) => log_id = Some(id),
                    Err(e) => error!(
                        conversation_id = %request.chat.conversation_id,
                        error = %e,
                        "Failed to save QA log"
                    ),
                }
            }
            guard.complete();

            if let Some(id) = log_id {
                yield RelayFrame::LogId(id);
            }
        }))
    }
}

async fn save_turn(
    store: &dyn QaStore,
    turns: &TurnTracker,
    request: &RelayRequest,
    answer: String,
) -> Result<i64, StoreError> {
    let turn_no = turns.next_turn(&request.chat.conversation_id).await?;
    let record = TurnRecord {
        session_id: request.chat.conversation_id.clone(),
        turn_no,
        user_cd: request.user_cd,
        question: request.chat.question.clone(),
        answer,
    };
    store.register_turn(&record).await
}

/// Logs when the response body is dropped before the relay ran to completion.
struct DisconnectGuard {
    conversation_id: String,
    completed: bool,
}

impl DisconnectGuard {
    fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.completed {
            debug!(
                conversation_id = %self.conversation_id,
                "Client disconnected; upstream closed and turn not saved"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frames_are_identical_in_both_formats() {
        let frame = RelayFrame::Text("こんにちは \"x\"".to_string());
        let envelope: Value = serde_json::from_str(&frame.encode(WireFormat::Envelope)).unwrap();
        assert_eq!(envelope, json!({"type": "text", "data": "こんにちは \"x\""}));
        assert_eq!(
            frame.encode(WireFormat::Envelope),
            frame.encode(WireFormat::Sentinel)
        );
        assert!(frame.encode(WireFormat::Sentinel).ends_with('\n'));
    }

    #[test]
    fn test_sentinel_encoding() {
        let meta = RelayFrame::Metadata(json!({"pdf_sources": ["a.pdf"]}));
        let encoded: Value =
            serde_json::from_str(meta.encode(WireFormat::Sentinel).trim_end()).unwrap();
        assert_eq!(encoded["type"], "text");
        assert_eq!(
            encoded["data"],
            "[[META]]{\"pdf_sources\":[\"a.pdf\"]}"
        );

        assert_eq!(
            RelayFrame::LogId(42).encode(WireFormat::Sentinel),
            "[[QA_LOG_CD]]42\n\n"
        );
        assert_eq!(
            RelayFrame::Error("quota exceeded".to_string()).encode(WireFormat::Sentinel),
            "data: [ERROR]quota exceeded\n\n"
        );
    }

    #[test]
    fn test_envelope_encoding() {
        let decode = |frame: RelayFrame| -> Value {
            serde_json::from_str(frame.encode(WireFormat::Envelope).trim_end()).unwrap()
        };
        assert_eq!(
            decode(RelayFrame::Metadata(json!({"k": 1}))),
            json!({"type": "metadata", "data": {"k": 1}})
        );
        assert_eq!(
            decode(RelayFrame::LogId(7)),
            json!({"type": "log_id", "data": 7})
        );
        assert_eq!(
            decode(RelayFrame::Error("boom".to_string())),
            json!({"type": "error", "data": "boom"})
        );
    }

    #[test]
    fn test_wire_format_deserializes_lowercase() {
        let format: WireFormat = serde_json::from_str("\"sentinel\"").unwrap();
        assert_eq!(format, WireFormat::Sentinel);
        assert_eq!(WireFormat::default(), WireFormat::Envelope);
    }
}
