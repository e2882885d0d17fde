//! # Authentication Route Handlers
//!
//! This module contains the Axum handlers for the login pages and the
//! Microsoft OAuth 2.0 authorization-code flow.

use super::{base_url, AppError, AppState};
use crate::{
    auth::{
        middleware::{redirect_found, RoutePrefix},
        oauth::logout_url,
        session::{
            current_session, encode_session, expired_cookie, oauth_state_cookie, session_cookie,
            SessionClaims, OAUTH_STATE_COOKIE, SESSION_COOKIE,
        },
    },
    config::LoginMode,
    types::{LoginErrorParams, OAuthCallbackParams},
};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use core_access::{get_user_by_email, upsert_user, User, UserLogin};
use tracing::{error, info, warn};

const LOGIN_PAGE: &str = include_str!("../../static/login.html");
const LOGIN_ERROR_PAGE: &str = include_str!("../../static/loginerr.html");

pub const USER_NOT_FOUND_ERROR: &str = "user_not_found";
pub const USER_NOT_FOUND_DESCRIPTION: &str = "ユーザーが登録されていません";

/// Sets the session cookie for `user` and sends the browser to the chat page.
fn start_session(
    app_state: &AppState,
    jar: CookieJar,
    user: &User,
    prefix: &str,
) -> Result<Response, AppError> {
    let token = encode_session(&SessionClaims::for_user(user), &app_state.config.session_secret)
        .map_err(|e| anyhow::anyhow!("Failed to sign session token: {e}"))?;
    let jar = jar.add(session_cookie(token, app_state.secure_cookies()));
    Ok((jar, redirect_found(&format!("{prefix}/chat"))).into_response())
}

fn login_error_redirect(prefix: &str, error: &str, description: &str) -> Response {
    redirect_found(&format!(
        "{prefix}/loginerr?error={}&error_description={}",
        urlencoding::encode(error),
        urlencoding::encode(description)
    ))
}

/// `/` and `/login`.
///
/// With login disabled every visitor becomes the system user. Otherwise a
/// visitor with a session goes straight to the chat page and everyone else
/// gets the login page.
pub async fn login_page(
    State(app_state): State<AppState>,
    RoutePrefix(prefix): RoutePrefix,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if app_state.config.login_mode == LoginMode::Disabled {
        let user = upsert_user(&app_state.db, &UserLogin::system()).await?;
        info!(user_cd = user.user_cd, "Login disabled, signing in as the system user");
        return start_session(&app_state, jar, &user, &prefix);
    }

    if current_session(&jar, &app_state.config.session_secret).is_some() {
        return Ok(redirect_found(&format!("{prefix}/chat")));
    }

    Ok(Html(LOGIN_PAGE).into_response())
}

pub async fn login_error_page(
    RoutePrefix(prefix): RoutePrefix,
    Query(params): Query<LoginErrorParams>,
) -> Response {
    let Some(error) = params.error.filter(|e| !e.is_empty()) else {
        return redirect_found(&format!("{prefix}/login"));
    };
    let description = params.error_description.unwrap_or_default();

    Html(
        LOGIN_ERROR_PAGE
            .replace("{{error_type}}", &escape_html(&error))
            .replace("{{error_description}}", &escape_html(&description)),
    )
    .into_response()
}

/// Ends the session and signs the user out of Microsoft as well.
pub async fn logout(
    State(app_state): State<AppState>,
    RoutePrefix(prefix): RoutePrefix,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let post_logout = format!("{}{prefix}/login", base_url(&app_state, &headers));
    let jar = jar.remove(expired_cookie(SESSION_COOKIE));
    (jar, redirect_found(&logout_url(&post_logout))).into_response()
}

pub async fn dashboard(RoutePrefix(prefix): RoutePrefix) -> Response {
    redirect_found(&format!("{prefix}/chat"))
}

fn callback_uri(app_state: &AppState, headers: &HeaderMap, prefix: &str) -> String {
    format!(
        "{}{prefix}/auth/microsoft/callback",
        base_url(app_state, headers)
    )
}

/// Starts the authorization-code flow.
pub async fn login_microsoft(
    State(app_state): State<AppState>,
    RoutePrefix(prefix): RoutePrefix,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let state = uuid::Uuid::new_v4().to_string();
    let redirect_uri = callback_uri(&app_state, &headers, &prefix);
    info!(redirect_uri = %redirect_uri, "Redirecting to Microsoft sign-in");

    let jar = jar.add(oauth_state_cookie(state.clone(), app_state.secure_cookies()));
    let authorize_url = app_state.oauth.authorize_url(&redirect_uri, &state);
    (jar, redirect_found(&authorize_url)).into_response()
}

/// Finishes the authorization-code flow and signs the user in.
pub async fn microsoft_callback(
    State(app_state): State<AppState>,
    RoutePrefix(prefix): RoutePrefix,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<Response, AppError> {
    if let Some(error) = params.error {
        warn!(error = %error, "Identity provider returned an error");
        let description = params.error_description.unwrap_or_default();
        return Ok(login_error_redirect(&prefix, &error, &description));
    }

    let expected_state = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(expired_cookie(OAUTH_STATE_COOKIE));
    let (Some(code), Some(state)) = (params.code, params.state) else {
        return Ok(login_error_redirect(&prefix, "invalid_request", "Missing code or state"));
    };
    if expected_state.as_deref() != Some(state.as_str()) {
        warn!("OAuth state mismatch");
        return Ok(login_error_redirect(&prefix, "invalid_state", "Login session expired"));
    }

    let redirect_uri = callback_uri(&app_state, &headers, &prefix);
    let identity = match app_state.oauth.exchange_code(&code, &redirect_uri).await {
        Ok(identity) => identity,
        Err(e) => {
            error!("Failed to redeem authorization code: {e:#}");
            return Ok(login_error_redirect(&prefix, "oauth_failed", "Sign-in failed"));
        }
    };
    let Some(email) = identity.email().map(str::to_string) else {
        warn!(subject = %identity.subject(), "id_token carries no email");
        return Ok(login_error_redirect(&prefix, "email_missing", "No email address"));
    };
    info!(email = %email, subject = %identity.subject(), "User logged in");

    if app_state.config.login_mode == LoginMode::RegisteredOnly
        && get_user_by_email(&app_state.db, &email).await?.is_none()
    {
        warn!(email = %email, "Login failed: user not found");
        return Ok(login_error_redirect(
            &prefix,
            USER_NOT_FOUND_ERROR,
            USER_NOT_FOUND_DESCRIPTION,
        ));
    }

    let user = upsert_user(
        &app_state.db,
        &UserLogin {
            email,
            subject_id: identity.subject().to_string(),
            display_name: identity.name.clone().unwrap_or_default(),
            provider: "microsoft".to_string(),
        },
    )
    .await?;

    start_session(&app_state, jar, &user, &prefix)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
