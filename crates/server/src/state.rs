//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. The `AppState` holds the configuration, the
//! database, the chat relay, document storage and the sign-in client.

use crate::{
    auth::oauth::MicrosoftOAuth,
    config::{AppConfig, StorageBackend},
};
use anyhow::anyhow;
use qachat::{
    blob::{AzureBlobStore, BlobStore, LocalBlobStore},
    upstream::http::HttpUpstreamOptions,
    ChatRelay, ChatUpstream, HttpChatUpstream, QaStore, TursoQaStore, TurnTracker,
};
use std::{path::Path, sync::Arc, time::Duration};
use tracing::{info, warn};
use turso::Database;

/// The shared application state, accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<AppConfig>,
    /// The database holding both the user directory and the Q&A log.
    pub db: Database,
    pub store: Arc<dyn QaStore>,
    pub relay: Arc<ChatRelay>,
    pub blobs: Arc<dyn BlobStore>,
    pub oauth: Arc<MicrosoftOAuth>,
}

impl AppState {
    /// Wires the state from already constructed services.
    pub fn new(
        mut config: AppConfig,
        db: Database,
        store: Arc<dyn QaStore>,
        upstream: Arc<dyn ChatUpstream>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        if config.session_secret.is_empty() {
            warn!("No session_secret configured. Using a random key; sessions end on restart.");
            config.session_secret = uuid::Uuid::new_v4().to_string();
        }

        let turns = Arc::new(TurnTracker::new(store.clone()));
        let relay = ChatRelay::new(upstream, store.clone(), turns, config.relay.wire_format);
        let oauth = MicrosoftOAuth::new(&config.oauth);

        AppState {
            config: Arc::new(config),
            db,
            store,
            relay: Arc::new(relay),
            blobs,
            oauth: Arc::new(oauth),
        }
    }

    /// Session cookies are marked `Secure` when the app is served over HTTPS.
    pub fn secure_cookies(&self) -> bool {
        self.config
            .public_base_url
            .as_deref()
            .is_some_and(|url| url.starts_with("https://"))
    }
}

/// Builds the shared application state from the configuration.
///
/// - Opens the database file and makes sure both schemas exist.
/// - Creates the HTTP client for the upstream Q&A service.
/// - Selects the document storage backend.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    if config.db_url != ":memory:" {
        if let Some(parent) = Path::new(&config.db_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let store = TursoQaStore::new(&config.db_url).await?;
    store.initialize_schema().await?;
    let db = store.database().clone();
    core_access::initialize_schema(&db).await?;
    info!(db_path = %config.db_url, "Initialized local storage (SQLite).");

    if config.chat_api.url.is_empty() {
        warn!("chat_api.url is not configured; chat requests will fail.");
    }
    let upstream = HttpChatUpstream::new(
        config.chat_api.url.clone(),
        HttpUpstreamOptions {
            api_key: config.chat_api.api_key.clone(),
            connect_timeout: config.chat_api.connect_timeout_secs.map(Duration::from_secs),
            accept_invalid_certs: config.chat_api.accept_invalid_certs,
        },
    )?;

    let blobs: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackend::Local => {
            info!(root = %config.storage.local_root, "Serving documents from the local filesystem.");
            Arc::new(LocalBlobStore::new(&config.storage.local_root))
        }
        StorageBackend::Azure => {
            let container_url = config
                .storage
                .container_url
                .as_deref()
                .ok_or_else(|| anyhow!("storage.container_url is required for the azure backend"))?;
            let sas_token = config.storage.sas_token.as_deref().unwrap_or_default();
            info!(container = %container_url, "Serving documents from Azure Blob Storage.");
            Arc::new(AzureBlobStore::new(container_url, sas_token)?)
        }
    };

    Ok(AppState::new(
        config,
        db,
        Arc::new(store),
        Arc::new(upstream),
        blobs,
    ))
}
