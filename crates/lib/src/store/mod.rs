//! # Persistence Gateway
//!
//! The `QaStore` trait is the seam between the chat pipeline and the
//! relational store that keeps the question/answer log. Each operation behaves
//! like a stored procedure: it runs in its own transaction on its own
//! connection, and reports application-level failures as
//! [`StoreError::Procedure`] with one of the codes below.

mod sql;
pub mod turso;

use crate::{
    errors::StoreError,
    types::{QaTurn, SessionSummary, TurnRecord},
};
use async_trait::async_trait;
use std::fmt::Debug;

/// A turn with the same `(session_id, turn_no)` already exists.
pub const ERR_DUPLICATE_TURN: i32 = 1;
/// The referenced log id does not exist.
pub const ERR_LOG_NOT_FOUND: i32 = 2;
/// An argument was empty or out of range.
pub const ERR_INVALID_ARGUMENT: i32 = 3;

pub const PROC_REGISTER_QA_LOG: &str = "Register_QA_Log";
pub const PROC_MARK_RESOLVED_QA: &str = "Mark_Resolved_QA";

/// A trait for the question/answer log store.
#[async_trait]
pub trait QaStore: Send + Sync + Debug {
    /// Records one completed exchange and returns the generated log id.
    async fn register_turn(&self, turn: &TurnRecord) -> Result<i64, StoreError>;

    /// Marks every turn of the session owning `qa_log_cd` as resolved at that
    /// log's turn number.
    async fn mark_resolved(&self, qa_log_cd: i64) -> Result<(), StoreError>;

    /// Returns all turns of a session, ascending by turn number.
    async fn get_session_turns(&self, session_id: &str) -> Result<Vec<QaTurn>, StoreError>;

    /// Returns up to `limit` session summaries for a user, most recent first.
    async fn get_user_sessions(
        &self,
        user_cd: i64,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError>;
}

/// Builds the error returned when a procedure argument is rejected.
pub(crate) fn invalid_argument(procedure: &'static str, message: &str) -> StoreError {
    StoreError::Procedure {
        procedure,
        code: ERR_INVALID_ARGUMENT,
        message: message.to_string(),
    }
}

/// Folds turns into per-session summaries, most recent first.
///
/// The first question of a session is taken from its lowest turn number,
/// whatever order the turns arrive in.
pub fn summarize_sessions(turns: &[QaTurn], limit: usize) -> Vec<SessionSummary> {
    let mut ordered: Vec<&QaTurn> = turns.iter().collect();
    ordered.sort_by(|a, b| {
        a.session_id
            .cmp(&b.session_id)
            .then(a.turn_no.cmp(&b.turn_no))
    });

    let mut summaries: Vec<SessionSummary> = Vec::new();
    for turn in ordered {
        match summaries.last_mut() {
            Some(summary) if summary.session_id == turn.session_id => {
                summary.first_message_at = summary.first_message_at.min(turn.registered_at);
                summary.last_message_at = summary.last_message_at.max(turn.registered_at);
                summary.message_count += 1;
                summary.last_turn_no = summary.last_turn_no.max(turn.turn_no);
                summary.resolved_turn_no = summary.resolved_turn_no.max(turn.resolved_turn_no);
            }
            _ => summaries.push(SessionSummary {
                session_id: turn.session_id.clone(),
                first_message_at: turn.registered_at,
                last_message_at: turn.registered_at,
                message_count: 1,
                last_turn_no: turn.turn_no,
                resolved_turn_no: turn.resolved_turn_no,
                first_question: Some(turn.question_text.clone()),
            }),
        }
    }

    summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    summaries.truncate(limit);
    summaries
}
