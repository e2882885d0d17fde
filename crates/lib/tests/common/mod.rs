#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the library integration tests.

use dotenvy::dotenv;
use qachat::types::ChatRequest;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        tracing_subscriber::fmt::init();
    });
}

/// A question with no history for the given conversation.
pub fn chat_request(conversation_id: &str, question: &str) -> ChatRequest {
    ChatRequest {
        conversation_id: conversation_id.to_string(),
        question: question.to_string(),
        chat_history: Vec::new(),
    }
}
