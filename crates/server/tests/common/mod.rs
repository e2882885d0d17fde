//! # Common Test Utilities
//!
//! This module centralizes the test harness used across the `qachat-server`
//! integration tests.
//!
//! - `TestApp`: spawns a real server on a random port with a temporary
//!   database, a temporary document root and an `httpmock` server standing in
//!   for both the upstream Q&A API and the identity provider.
//! - Helpers for registering users and minting session cookies.

// Allow unused code because this is a test utility module, and not all
// functions might be used by every test file that includes it.
#![allow(unused)]

use anyhow::Result;
use axum::serve;
use chrono::Utc;
use core_access::{upsert_user, User, UserLogin};
use httpmock::MockServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use qachat::{types::TurnRecord, QaStore};
use qachat_server::{
    auth::session::{encode_session, SessionClaims, SESSION_COOKIE},
    config, router,
    state::{build_app_state, AppState},
};
use reqwest::{header::SET_COOKIE, redirect::Policy, Client, Response};
use serde_json::json;
use std::{fs::File, io::Write, net::SocketAddr, path::PathBuf};
use tempfile::{tempdir, NamedTempFile, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};

pub const TEST_SESSION_SECRET: &str = "test-session-secret";
pub const TEST_CLIENT_ID: &str = "test-client-id";

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    /// A client that does not follow redirects, so they can be asserted.
    pub client: Client,
    pub mock_server: MockServer,
    pub db_path: PathBuf,
    pub blob_root: PathBuf,
    pub app_state: AppState,
    _db_file: NamedTempFile,
    _blob_dir: TempDir,
    _config_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the application server with the default test configuration.
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_config("").await
    }

    /// Spawns the server with `extra_yaml` appended to the test `config.yml`.
    /// The extra keys must not repeat the base ones.
    pub async fn spawn_with_config(extra_yaml: &str) -> Result<Self> {
        let mock_server = MockServer::start_async().await;
        let db_file = NamedTempFile::new()?;
        let db_path = db_file.path().to_path_buf();
        let blob_dir = tempdir()?;

        let config_dir = tempdir()?;
        let config_path = config_dir.path().join("config.yml");
        println!("[TestApp::spawn] CONFIGURING with DB path: {db_path:?}");
        let config_content = format!(
            r#"
port: 0
db_url: "{}"
session_secret: "{TEST_SESSION_SECRET}"
chat_api:
  url: "{}"
  api_key: "test-api-key"
oauth:
  client_id: "{TEST_CLIENT_ID}"
  client_secret: "test-client-secret"
  authority: "{}"
storage:
  backend: local
  local_root: "{}"
{extra_yaml}
"#,
            db_path.to_str().unwrap(),
            mock_server.url("/chat"),
            mock_server.url("/common"),
            blob_dir.path().to_str().unwrap(),
        );
        let mut file = File::create(&config_path)?;
        file.write_all(config_content.as_bytes())?;

        let config = config::get_config(Some(config_path.to_str().unwrap()))?;
        let app_state = build_app_state(config).await?;

        dotenvy::dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let state_for_server = app_state.clone();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(state_for_server);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            client: Client::builder().redirect(Policy::none()).build()?,
            mock_server,
            db_path,
            blob_root: blob_dir.path().to_path_buf(),
            app_state,
            _db_file: db_file,
            _blob_dir: blob_dir,
            _config_dir: config_dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    /// Registers a user in the directory as a Microsoft login would.
    pub async fn create_user(&self, email: &str, name: &str) -> Result<User> {
        Ok(upsert_user(
            &self.app_state.db,
            &UserLogin {
                email: email.to_string(),
                subject_id: format!("oid-{email}"),
                display_name: name.to_string(),
                provider: "microsoft".to_string(),
            },
        )
        .await?)
    }

    /// Registers a user and returns them with a `Cookie` header value.
    pub async fn signed_in_user(&self, email: &str) -> Result<(User, String)> {
        let user = self.create_user(email, "Test User").await?;
        let cookie = session_cookie_for(&user);
        Ok((user, cookie))
    }

    /// Writes a document into the temporary blob root.
    pub fn put_document(&self, name: &str, content: &[u8]) -> Result<()> {
        let path = self.blob_root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Stores a finished turn directly, bypassing the relay.
    pub async fn seed_turn(
        &self,
        session_id: &str,
        turn_no: i64,
        user_cd: i64,
        question: &str,
    ) -> Result<i64> {
        Ok(self
            .app_state
            .store
            .register_turn(&TurnRecord {
                session_id: session_id.to_string(),
                turn_no,
                user_cd,
                question: question.to_string(),
                answer: format!("answer to {question}"),
            })
            .await?)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// --- Session Helpers ---

/// A `Cookie` header value carrying a valid session for `user`.
pub fn session_cookie_for(user: &User) -> String {
    let token = encode_session(&SessionClaims::for_user(user), TEST_SESSION_SECRET).unwrap();
    format!("{SESSION_COOKIE}={token}")
}

/// A session for an email that has no directory entry.
pub fn session_cookie_for_unknown_user(email: &str) -> String {
    let claims = SessionClaims {
        sub: "oid-unknown".to_string(),
        email: email.to_string(),
        name: "Ghost".to_string(),
        user_cd: 999,
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    format!(
        "{SESSION_COOKIE}={}",
        encode_session(&claims, TEST_SESSION_SECRET).unwrap()
    )
}

/// An `id_token` as the token endpoint would return it.
pub fn generate_id_token(email: &str, name: &str, audience: &str) -> String {
    let claims = json!({
        "aud": audience,
        "iss": "https://login.microsoftonline.com/tenant/v2.0",
        "exp": Utc::now().timestamp() + 3600,
        "oid": format!("oid-{email}"),
        "preferred_username": email,
        "name": name,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"not-checked"),
    )
    .unwrap()
}

/// Returns the `name=value` part of the `Set-Cookie` header for `name`.
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{name}=")))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
