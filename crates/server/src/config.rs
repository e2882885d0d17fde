//! # Application Configuration
//!
//! This module defines the configuration structure for the `qachat-server` and
//! provides the logic for loading it from an optional `config.yml` file and
//! environment variables.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use qachat::{constants::DEFAULT_CONVERSATION_TITLE, WireFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates an explicitly requested configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// How visitors are signed in.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "u8")]
pub enum LoginMode {
    /// `1`: no login page, everyone is the system user.
    Disabled,
    /// `2`: Microsoft login, every employee is admitted.
    #[default]
    Open,
    /// `3`: Microsoft login, only users already in the directory are admitted.
    RegisteredOnly,
}

impl LoginMode {
    pub fn as_number(self) -> u8 {
        match self {
            LoginMode::Disabled => 1,
            LoginMode::Open => 2,
            LoginMode::RegisteredOnly => 3,
        }
    }
}

impl TryFrom<u8> for LoginMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(LoginMode::Disabled),
            2 => Ok(LoginMode::Open),
            3 => Ok(LoginMode::RegisteredOnly),
            other => Err(format!("login_mode must be 1, 2 or 3, got {other}")),
        }
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The path to the SQLite database file. Loaded from `DB_URL` env var.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    #[serde(default)]
    pub login_mode: LoginMode,
    /// Key used to sign session cookies. A random key is generated at
    /// startup when empty, which logs everyone out on restart.
    #[serde(default)]
    pub session_secret: String,
    /// Scheme and host the browser uses to reach the app, e.g.
    /// `https://intra.example.com`. Derived from the `Host` header when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_app_env")]
    pub app_env: String,

    #[serde(default)]
    pub chat_api: ChatApiConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

fn default_port() -> u16 {
    8086
}

fn default_db_url() -> String {
    qachat::constants::DEFAULT_DB_FILE.to_string()
}

fn default_app_env() -> String {
    "dev".to_string()
}

/// The upstream Q&A service.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatApiConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// The Microsoft identity platform application.
#[derive(Debug, Deserialize, Clone)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_authority")]
    pub authority: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            authority: default_authority(),
        }
    }
}

fn default_authority() -> String {
    "https://login.microsoftonline.com/common".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Azure,
}

/// Where reference documents live.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_local_root")]
    pub local_root: String,
    #[serde(default)]
    pub container_url: Option<String>,
    #[serde(default)]
    pub sas_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: default_local_root(),
            container_url: None,
            sas_token: None,
        }
    }
}

fn default_local_root() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub wire_format: WireFormat,
}

/// Texts shown by the chat page.
#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default)]
    pub header_title: Option<String>,
    #[serde(default)]
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub default_question: Option<String>,
    #[serde(default = "default_conversation_title")]
    pub default_conversation_title: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            header_title: None,
            welcome_message: None,
            default_question: None,
            default_conversation_title: default_conversation_title(),
        }
    }
}

fn default_conversation_title() -> String {
    DEFAULT_CONVERSATION_TITLE.to_string()
}

/// The transcript replayed by the demo upstream endpoint.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DemoConfig {
    #[serde(default)]
    pub transcript_path: Option<String>,
}

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    Ok(Some(substitute_env(&content)?))
}

/// Replaces `${VAR}` placeholders with the value of the environment variable,
/// or an empty string when it is unset.
fn substitute_env(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(format!("Invalid placeholder pattern: {e}")))?;
    let expanded = re.replace_all(content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });
    Ok(expanded.into_owned())
}

/// Returns the value of `name` if it is set and not blank.
fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Fills settings that are still empty from the variable names the first
/// deployment used.
fn apply_legacy_env(config: &mut AppConfig) {
    if config.chat_api.url.is_empty() {
        if let Some(url) = env_value("CHAT_API_URL") {
            config.chat_api.url = url;
        }
    }
    if config.chat_api.api_key.is_none() {
        config.chat_api.api_key = env_value("CHAT_API_KEY");
    }
    if config.oauth.client_id.is_empty() {
        if let Some(id) = env_value("MICROSOFT_CLIENT_ID") {
            config.oauth.client_id = id;
        }
    }
    if config.oauth.client_secret.is_empty() {
        if let Some(secret) = env_value("MICROSOFT_CLIENT_SECRET") {
            config.oauth.client_secret = secret;
        }
    }
    if config.session_secret.is_empty() {
        if let Some(secret) = env_value("SECRET_KEY") {
            config.session_secret = secret;
        }
    }
    if config.storage.container_url.is_none() {
        config.storage.container_url = env_value("AZURE_BLOB_CONTAINER_URL");
    }
    if config.storage.sas_token.is_none() {
        config.storage.sas_token = env_value("AZURE_BLOB_SAS_TOKEN");
    }
    if config.ui.header_title.is_none() {
        config.ui.header_title = env_value("HEADER_TITLE");
    }
    if config.ui.welcome_message.is_none() {
        config.ui.welcome_message = env_value("WELCOME_MESSAGE");
    }
    if config.ui.default_question.is_none() {
        config.ui.default_question = env_value("QUESTION_DEFAULT");
    }
}

/// Loads the application configuration from a file and environment variables.
///
/// - The YAML file is optional unless a path is passed explicitly.
/// - Top-level keys like `port` and `login_mode` are overridden by `PORT` and
///   `LOGIN_MODE`.
/// - Nested keys are overridden by `QACHAT_...` variables (e.g.
///   `QACHAT_CHAT_API__URL`).
/// - Settings still empty afterwards fall back to the legacy variable names
///   (`CHAT_API_URL`, `MICROSOFT_CLIENT_ID`, `SECRET_KEY`, ...).
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let base_path = env!("CARGO_MANIFEST_DIR");
    let mut builder = ConfigBuilder::builder();

    let content = match config_path_override {
        Some(path) => Some(read_and_substitute(path)?.ok_or_else(|| {
            ConfigError::NotFound(format!("Config file not found at '{path}'."))
        })?),
        None => {
            let default_path = format!("{base_path}/config.yml");
            let content = read_and_substitute(&default_path)?;
            if content.is_some() {
                info!("Loading configuration from '{default_path}'.");
            } else {
                info!("'{default_path}' not found. Using defaults and environment only.");
            }
            content
        }
    };
    if let Some(content) = content {
        builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
    }

    let settings = builder
        .add_source(Environment::default())
        .add_source(
            Environment::with_prefix("QACHAT")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;
    apply_legacy_env(&mut config);

    Ok(config)
}
