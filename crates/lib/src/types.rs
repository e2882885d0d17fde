//! # Shared Data Types
//!
//! Records exchanged between the relay, the turn tracker and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One previous question/answer pair sent along with a new question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryTurn {
    pub question: String,
    pub answer: String,
}

/// The body sent to the upstream Q&A service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: String,
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<HistoryTurn>,
}

/// A turn that is about to be registered.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub session_id: String,
    pub turn_no: i64,
    pub user_cd: i64,
    pub question: String,
    pub answer: String,
}

/// A persisted question/answer turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaTurn {
    pub qa_log_cd: i64,
    pub session_id: String,
    pub turn_no: i64,
    pub user_cd: i64,
    pub question_text: String,
    pub answer_text: String,
    pub resolved_turn_no: Option<i64>,
    pub registered_at: DateTime<Utc>,
}

impl QaTurn {
    pub fn is_resolved(&self) -> bool {
        self.resolved_turn_no.is_some()
    }
}

/// Aggregated view of one conversation, as listed in the sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub first_message_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub message_count: i64,
    pub last_turn_no: i64,
    pub resolved_turn_no: Option<i64>,
    pub first_question: Option<String>,
}

impl SessionSummary {
    pub fn is_resolved(&self) -> bool {
        self.resolved_turn_no.is_some()
    }
}
