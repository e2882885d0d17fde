//! # General Route Handlers
//!
//! Health check, UI settings, the current user and the chat page.

use super::{resolve_user, AppError, AppState};
use crate::{
    auth::middleware::{AuthenticatedUser, BrowserUser},
    types::{ApiResponse, MeResponse, SettingsResponse},
};
use axum::{extract::State, response::Html, Json};

const CHAT_PAGE: &str = include_str!("../../static/chat.html");

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Texts the chat page shows. Public, so the login page can use them too.
pub async fn settings_handler(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<SettingsResponse>> {
    let config = &app_state.config;
    Json(ApiResponse::ok(SettingsResponse {
        header_title: config.ui.header_title.clone(),
        welcome_message: config.ui.welcome_message.clone(),
        question_default: config.ui.default_question.clone(),
        app_env: config.app_env.clone(),
        login_mode: config.login_mode.as_number(),
    }))
}

/// Returns the currently signed-in user.
pub async fn me_handler(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<ApiResponse<MeResponse>>, AppError> {
    let user = resolve_user(&app_state, &claims).await?;
    Ok(Json(ApiResponse::ok(MeResponse {
        user_cd: user.user_cd,
        email: user.email,
        name: user.display_name.unwrap_or(claims.name),
    })))
}

pub async fn chat_page(BrowserUser(_claims): BrowserUser) -> Html<&'static str> {
    Html(CHAT_PAGE)
}
