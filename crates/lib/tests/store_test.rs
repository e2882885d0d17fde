//! # Q&A Store Tests
//!
//! Runs the turso-backed store against an in-memory database.

mod common;

use common::setup_tracing;
use qachat::{
    store::{ERR_DUPLICATE_TURN, ERR_INVALID_ARGUMENT, ERR_LOG_NOT_FOUND},
    types::TurnRecord,
    QaStore, TursoQaStore,
};
use qachat_test_utils::TestSetup;

async fn new_store() -> TursoQaStore {
    TestSetup::new().await.unwrap().store
}

fn record(session_id: &str, turn_no: i64, user_cd: i64, question: &str) -> TurnRecord {
    TurnRecord {
        session_id: session_id.to_string(),
        turn_no,
        user_cd,
        question: question.to_string(),
        answer: format!("answer to {question}"),
    }
}

#[tokio::test]
async fn test_register_and_load_session_turns() {
    // --- 1. Arrange ---
    setup_tracing();
    let store = new_store().await;

    // --- 2. Act ---
    // Registered out of order on purpose.
    let second = store.register_turn(&record("s1", 2, 1, "Q2")).await.unwrap();
    let first = store.register_turn(&record("s1", 1, 1, "Q1")).await.unwrap();
    store.register_turn(&record("s2", 1, 1, "other")).await.unwrap();
    let turns = store.get_session_turns("s1").await.unwrap();

    // --- 3. Assert ---
    assert_ne!(first, second);
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].turn_no, 1);
    assert_eq!(turns[0].qa_log_cd, first);
    assert_eq!(turns[0].question_text, "Q1");
    assert_eq!(turns[0].answer_text, "answer to Q1");
    assert_eq!(turns[1].turn_no, 2);
    assert!(turns.iter().all(|t| !t.is_resolved()));
}

#[tokio::test]
async fn test_initialize_schema_is_idempotent() {
    setup_tracing();
    let store = new_store().await;
    store.register_turn(&record("s1", 1, 1, "Q")).await.unwrap();

    store.initialize_schema().await.unwrap();

    assert_eq!(store.get_session_turns("s1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_rejects_duplicate_turn() {
    // --- 1. Arrange ---
    setup_tracing();
    let store = new_store().await;
    store.register_turn(&record("s1", 1, 1, "Q1")).await.unwrap();

    // --- 2. Act ---
    let err = store
        .register_turn(&record("s1", 1, 1, "Q1 again"))
        .await
        .unwrap_err();

    // --- 3. Assert ---
    assert_eq!(err.procedure_code(), Some(ERR_DUPLICATE_TURN));
    let turns = store.get_session_turns("s1").await.unwrap();
    assert_eq!(turns.len(), 1, "The rejected turn must be rolled back");
    assert_eq!(turns[0].question_text, "Q1");
}

#[tokio::test]
async fn test_register_rejects_invalid_arguments() {
    setup_tracing();
    let store = new_store().await;

    let empty_session = store.register_turn(&record("", 1, 1, "Q")).await.unwrap_err();
    let zero_turn = store.register_turn(&record("s1", 0, 1, "Q")).await.unwrap_err();

    assert_eq!(empty_session.procedure_code(), Some(ERR_INVALID_ARGUMENT));
    assert_eq!(zero_turn.procedure_code(), Some(ERR_INVALID_ARGUMENT));
}

#[tokio::test]
async fn test_mark_resolved_marks_whole_session() {
    // --- 1. Arrange ---
    setup_tracing();
    let store = new_store().await;
    store.register_turn(&record("s1", 1, 1, "Q1")).await.unwrap();
    let second = store.register_turn(&record("s1", 2, 1, "Q2")).await.unwrap();
    store.register_turn(&record("s1", 3, 1, "Q3")).await.unwrap();
    store.register_turn(&record("s2", 1, 1, "other")).await.unwrap();

    // --- 2. Act ---
    store.mark_resolved(second).await.unwrap();

    // --- 3. Assert ---
    let turns = store.get_session_turns("s1").await.unwrap();
    assert!(turns.iter().all(|t| t.resolved_turn_no == Some(2)));
    let other = store.get_session_turns("s2").await.unwrap();
    assert_eq!(other[0].resolved_turn_no, None);
}

#[tokio::test]
async fn test_mark_resolved_unknown_log() {
    setup_tracing();
    let store = new_store().await;

    let missing = store.mark_resolved(999).await.unwrap_err();
    let invalid = store.mark_resolved(0).await.unwrap_err();

    assert_eq!(missing.procedure_code(), Some(ERR_LOG_NOT_FOUND));
    assert_eq!(invalid.procedure_code(), Some(ERR_INVALID_ARGUMENT));
}

#[tokio::test]
async fn test_get_user_sessions_summarizes_and_limits() {
    // --- 1. Arrange ---
    setup_tracing();
    let store = new_store().await;
    store.register_turn(&record("old", 1, 1, "Old question")).await.unwrap();
    store.register_turn(&record("old", 2, 1, "Follow up")).await.unwrap();
    let resolved = store
        .register_turn(&record("new", 1, 1, "New question"))
        .await
        .unwrap();
    store.register_turn(&record("foreign", 1, 2, "Not mine")).await.unwrap();
    store.mark_resolved(resolved).await.unwrap();

    // --- 2. Act ---
    let sessions = store.get_user_sessions(1, 50).await.unwrap();
    let limited = store.get_user_sessions(1, 1).await.unwrap();

    // --- 3. Assert ---
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_id, "new");
    assert!(sessions[0].is_resolved());
    assert_eq!(sessions[1].session_id, "old");
    assert_eq!(sessions[1].message_count, 2);
    assert_eq!(sessions[1].last_turn_no, 2);
    assert_eq!(sessions[1].first_question.as_deref(), Some("Old question"));
    assert!(sessions[1].first_message_at <= sessions[1].last_message_at);
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_queries_return_empty_when_nothing_matches() {
    setup_tracing();
    let store = new_store().await;

    assert!(store.get_session_turns("missing").await.unwrap().is_empty());
    assert!(store.get_user_sessions(42, 50).await.unwrap().is_empty());
}
