//! # Route Handlers
//!
//! This module organizes all the Axum route handlers for the `qachat-server`.
//! The handlers are split into sub-modules by area: sign-in, chat,
//! conversation history, documents and the demo upstream.

pub mod auth_handlers;
pub mod chat_handlers;
pub mod conversation_handlers;
pub mod demo_handlers;
pub mod document_handlers;
pub mod general;

// Re-export all handlers from the sub-modules to make them easily accessible
// to the router under a single `handlers::` path.
pub use auth_handlers::*;
pub use chat_handlers::*;
pub use conversation_handlers::*;
pub use demo_handlers::*;
pub use document_handlers::*;
pub use general::*;

// Shared items used by multiple handler modules.
use super::{auth::session::SessionClaims, errors::AppError, state::AppState};
use axum::http::{header, HeaderMap};
use core_access::{get_user_by_email, User};

/// Loads the directory entry of the session's user.
pub(crate) async fn resolve_user(
    app_state: &AppState,
    claims: &SessionClaims,
) -> Result<User, AppError> {
    get_user_by_email(&app_state.db, &claims.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// The scheme and host the browser uses, from `public_base_url` or the
/// `Host` header.
pub(crate) fn base_url(app_state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &app_state.config.public_base_url {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}
