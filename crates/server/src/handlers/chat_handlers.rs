//! # Chat Route Handler
//!
//! Relays a question to the upstream Q&A service and streams the answer back
//! frame by frame.

use super::{resolve_user, AppError, AppState};
use crate::auth::middleware::AuthenticatedUser;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use qachat::{ChatRequest, HistoryTurn, RelayRequest};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::info;

/// The body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<HistoryTurn>,
}

/// Headers that keep proxies and browsers from buffering or caching the stream.
pub(crate) fn no_buffering_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
}

pub async fn chat_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Response, AppError> {
    let user = resolve_user(&app_state, &claims).await?;
    let Json(payload) = payload?;

    let conversation_id = payload.conversation_id.trim().to_string();
    if conversation_id.is_empty() {
        return Err(AppError::Validation(
            "conversation_id is required".to_string(),
        ));
    }
    if payload.question.trim().is_empty() {
        return Err(AppError::Validation("question is required".to_string()));
    }

    info!(
        user_cd = user.user_cd,
        conversation_id = %conversation_id,
        "Relaying chat question"
    );
    let frames = app_state
        .relay
        .open(RelayRequest {
            user_cd: user.user_cd,
            chat: ChatRequest {
                conversation_id,
                question: payload.question,
                chat_history: payload.chat_history,
            },
        })
        .await?;

    let wire_format = app_state.relay.wire_format();
    let body = Body::from_stream(
        frames.map(move |frame| Ok::<_, Infallible>(frame.encode(wire_format))),
    );

    let mut response = (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response();
    no_buffering_headers(&mut response);
    Ok(response)
}
