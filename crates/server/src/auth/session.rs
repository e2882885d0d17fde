//! # Session Tokens
//!
//! A signed-in visitor carries an HS256 JWT in an HttpOnly cookie. The token
//! holds everything the pages need, so no server-side session table exists.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use core_access::User;
use jsonwebtoken::{decode, encode, errors::Error as JwtError, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "qachat_session";
/// Holds the CSRF `state` between the authorize redirect and the callback.
pub const OAUTH_STATE_COOKIE: &str = "qachat_oauth_state";
pub const SESSION_TTL_HOURS: i64 = 8;

/// Represents the claims we put in the session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// The identity provider's object id of the user.
    pub sub: String,
    pub email: String,
    pub name: String,
    pub user_cd: i64,
    /// The expiration timestamp.
    pub exp: usize,
}

impl SessionClaims {
    pub fn for_user(user: &User) -> Self {
        let exp = (Utc::now() + Duration::hours(SESSION_TTL_HOURS)).timestamp() as usize;
        Self {
            sub: user.subject_id.clone().unwrap_or_default(),
            email: user.email.clone(),
            name: user.display_name.clone().unwrap_or_default(),
            user_cd: user.user_cd,
            exp,
        }
    }
}

pub fn encode_session(claims: &SessionClaims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validates the signature and expiry of a session token.
pub fn decode_session(token: &str, secret: &str) -> Result<SessionClaims, JwtError> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Returns the claims of the session cookie in `jar`, if it holds a valid one.
pub fn current_session(jar: &CookieJar, secret: &str) -> Option<SessionClaims> {
    let cookie = jar.get(SESSION_COOKIE)?;
    decode_session(cookie.value(), secret).ok()
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    http_only_cookie(SESSION_COOKIE, token, secure)
}

pub fn oauth_state_cookie(state: String, secure: bool) -> Cookie<'static> {
    http_only_cookie(OAUTH_STATE_COOKIE, state, secure)
}

/// A cookie that only matches `name` and the path, for `CookieJar::remove`.
pub fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

fn http_only_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}
