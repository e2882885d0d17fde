//! # Authentication Middleware
//!
//! Axum extractors that gate handlers on a valid session cookie. They only
//! look at request headers, so they always run before the body is read.
//!
//! - `AuthenticatedUser` guards the JSON API and rejects with `401`.
//! - `BrowserUser` guards pages and redirects to the login page.
//! - `RoutePrefix` recovers the path prefix added by the reverse proxy.

use super::session::{current_session, SessionClaims};
use crate::state::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::convert::Infallible;
use tracing::debug;

/// Header set by IIS ARR with the path the browser actually requested.
pub const ORIGINAL_URL_HEADER: &str = "x-original-url";

/// The signed-in user of an API request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionClaims);

/// The signed-in user of a page request.
#[derive(Debug, Clone)]
pub struct BrowserUser(pub SessionClaims);

/// The path prefix the app is mounted under, e.g. `/aichatbot`, or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePrefix(pub String);

/// A custom rejection type for authentication failures on API routes.
pub struct AuthError(StatusCode, String);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "success": false, "error": self.1 }))).into_response()
    }
}

/// Redirects a browser without a session to the login page.
pub struct LoginRedirect(String);

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        redirect_found(&format!("{}/login", self.0))
    }
}

/// A `302 Found` redirect.
pub fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `/aichatbot/chat` gives `/aichatbot`; a single segment gives no prefix.
pub fn prefix_from_original_url(original_url: &str) -> String {
    let parts: Vec<&str> = original_url.split('/').collect();
    if parts.len() > 2 {
        format!("/{}", parts[1])
    } else {
        String::new()
    }
}

pub fn route_prefix(headers: &HeaderMap) -> String {
    headers
        .get(ORIGINAL_URL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(prefix_from_original_url)
        .unwrap_or_default()
}

fn session_from_parts(parts: &Parts, state: &AppState) -> Option<SessionClaims> {
    let jar = CookieJar::from_headers(&parts.headers);
    current_session(&jar, &state.config.session_secret)
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match session_from_parts(parts, state) {
            Some(claims) => Ok(AuthenticatedUser(claims)),
            None => {
                debug!(path = %parts.uri.path(), "Rejecting API request without a valid session");
                Err(AuthError(
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized".to_string(),
                ))
            }
        }
    }
}

impl FromRequestParts<AppState> for BrowserUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_from_parts(parts, state)
            .map(BrowserUser)
            .ok_or_else(|| LoginRedirect(route_prefix(&parts.headers)))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RoutePrefix {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RoutePrefix(route_prefix(&parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_from_original_url() {
        assert_eq!(prefix_from_original_url("/aichatbot/chat"), "/aichatbot");
        assert_eq!(prefix_from_original_url("/aichatbot/api/chat"), "/aichatbot");
        assert_eq!(prefix_from_original_url("/chat"), "");
        assert_eq!(prefix_from_original_url(""), "");
    }

    #[test]
    fn test_route_prefix_without_header() {
        assert_eq!(route_prefix(&HeaderMap::new()), "");
    }
}
