//! # Demo Upstream
//!
//! Replays a recorded answer as JSON lines, so the chat page can be tried
//! without the real Q&A service by pointing `chat_api.url` here.

use super::{chat_handlers::no_buffering_headers, AppError, AppState};
use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use qachat::constants::META_SENTINEL;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Turns one transcript line into a JSON line event.
///
/// A literal `\n` in the transcript stands for a newline in the token. Lines
/// with the metadata marker carry the JSON that follows it.
pub fn transcript_event(line: &str) -> String {
    let text = line.replace("\\n", "\n");
    let event = if text.contains(META_SENTINEL) {
        match serde_json::from_str::<Value>(&text.replace(META_SENTINEL, "")) {
            Ok(data) => json!({ "type": "metadata", "data": data }),
            Err(e) => {
                warn!("Transcript metadata is not valid JSON: {e}");
                json!({ "type": "text", "data": text })
            }
        }
    } else {
        json!({ "type": "text", "data": text })
    };
    format!("{event}\n")
}

pub async fn stream_jsonl_handler(State(app_state): State<AppState>) -> Result<Response, AppError> {
    let path = app_state
        .config
        .demo
        .transcript_path
        .clone()
        .ok_or_else(|| AppError::NotFound("Transcript not configured".to_string()))?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound("Transcript not found".to_string()));
        }
        Err(e) => return Err(anyhow::Error::from(e).into()),
    };
    info!(path = %path, "Replaying demo transcript");

    let events = async_stream::stream! {
        let mut lines = BufReader::new(file).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => yield Ok::<_, Infallible>(transcript_event(&line)),
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read transcript: {e}");
                    break;
                }
            }
        }
    };

    let mut response = (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(events),
    )
        .into_response();
    no_buffering_headers(&mut response);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_event_text_and_metadata() {
        let text = transcript_event("line one\\nline two");
        assert!(text.ends_with('\n'));
        let text: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(text, json!({"type": "text", "data": "line one\nline two"}));

        let meta: Value =
            serde_json::from_str(transcript_event("[[META]]{\"pdf_sources\":[\"a.pdf\"]}").trim())
                .unwrap();
        assert_eq!(meta, json!({"type": "metadata", "data": {"pdf_sources": ["a.pdf"]}}));
    }
}
