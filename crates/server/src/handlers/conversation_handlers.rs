//! # Conversation Route Handlers
//!
//! Conversation list, history and the "resolved" marker. A conversation has no
//! row of its own; it exists through the Q&A log entries sharing its id.

use super::{resolve_user, AppError, AppState};
use crate::{
    auth::middleware::AuthenticatedUser,
    types::{
        ApiResponse, ConversationItem, ConversationsResponse, HistoryMessage, HistoryResponse,
        NewConversationResponse, ResolveResponse,
    },
};
use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use qachat::SessionSummary;
use tracing::info;

/// The sidebar shows at most this many conversations.
pub const CONVERSATION_LIST_LIMIT: usize = 50;
const PREVIEW_CHARS: usize = 50;

pub const RESOLVED_MESSAGE: &str = "問題が解決済みとしてマークされました";

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The first characters of the opening question, followed by `...`.
fn preview(question: &str) -> String {
    let head: String = question.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}

fn conversation_item(summary: SessionSummary, default_title: &str) -> ConversationItem {
    let is_resolved = summary.is_resolved();
    let (title, last_message) = match summary.first_question.as_deref() {
        Some(question) => (preview(question), preview(question)),
        None => (default_title.to_string(), String::new()),
    };
    ConversationItem {
        id: summary.session_id,
        title,
        last_message,
        created_at: timestamp(&summary.first_message_at),
        updated_at: timestamp(&summary.last_message_at),
        message_count: summary.message_count,
        is_resolved,
    }
}

/// Hands out a fresh conversation id. Nothing is stored until its first turn.
pub async fn new_conversation_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> Json<ApiResponse<NewConversationResponse>> {
    let conversation_id = uuid::Uuid::new_v4().to_string();
    Json(ApiResponse::ok(NewConversationResponse {
        session_id: conversation_id.clone(),
        conversation_id,
        title: app_state.config.ui.default_conversation_title.clone(),
    }))
}

/// Lists the caller's conversations, most recently active first.
pub async fn list_conversations_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<ApiResponse<ConversationsResponse>>, AppError> {
    let user = resolve_user(&app_state, &claims).await?;
    let sessions = app_state
        .store
        .get_user_sessions(user.user_cd, CONVERSATION_LIST_LIMIT)
        .await?;

    let default_title = &app_state.config.ui.default_conversation_title;
    let conversations = sessions
        .into_iter()
        .map(|summary| conversation_item(summary, default_title))
        .collect();
    Ok(Json(ApiResponse::ok(ConversationsResponse { conversations })))
}

/// Marks the conversation of a log entry as resolved at that entry's turn.
pub async fn resolve_conversation_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<ResolveResponse>>, AppError> {
    let Path(raw_id) = path?;
    let qa_log_cd = raw_id
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Validation("Invalid qa_log_cd".to_string()))?;

    app_state.store.mark_resolved(qa_log_cd).await?;
    info!(qa_log_cd, email = %claims.email, "Conversation marked as resolved");

    Ok(Json(ApiResponse::ok(ResolveResponse {
        qa_log_cd,
        message: RESOLVED_MESSAGE.to_string(),
    })))
}

/// Returns the caller's turns of one conversation in order.
pub async fn conversation_history_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<HistoryResponse>>, AppError> {
    let Path(session_id) = path?;
    let user = resolve_user(&app_state, &claims).await?;

    let messages: Vec<HistoryMessage> = app_state
        .store
        .get_session_turns(&session_id)
        .await?
        .into_iter()
        .filter(|turn| turn.user_cd == user.user_cd)
        .map(|turn| HistoryMessage {
            turn_no: turn.turn_no,
            is_resolved: turn.is_resolved(),
            timestamp: timestamp(&turn.registered_at),
            question: turn.question_text,
            answer: turn.answer_text,
        })
        .collect();

    Ok(Json(ApiResponse::ok(HistoryResponse {
        session_id,
        total_turns: messages.len(),
        messages,
    })))
}
