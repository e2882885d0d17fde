//! # Core Access Crate
//!
//! The user directory of the chatbot. Every successful login upserts the
//! signed-in employee, and the numeric `user_cd` assigned here is what the Q&A
//! log refers to.

/// Email of the user every visitor becomes when login is disabled.
pub const SYSTEM_USER_EMAIL: &str = "system@local.com";
pub const SYSTEM_USER_NAME: &str = "System User";
pub const SYSTEM_USER_SUBJECT: &str = "system";

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use turso::{Database, Error as TursoError, Row, Value as TursoValue, params};

#[derive(Error, Debug)]
pub enum CoreAccessError {
    #[error("Database error: {0}")]
    Database(#[from] TursoError),
    #[error("Failed to create or find user for identifier: {0}")]
    UserPersistenceFailed(String),
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
}

const CREATE_USERS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS users (
        user_cd INTEGER PRIMARY KEY AUTOINCREMENT,
        subject_id TEXT,
        email TEXT NOT NULL,
        display_name TEXT,
        provider TEXT,
        last_login_at TEXT,
        created_at TEXT NOT NULL,
        delete_flg INTEGER NOT NULL DEFAULT 0
    );
";

const CREATE_USERS_EMAIL_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users (email);";

const SELECT_ACTIVE_USER_BY_EMAIL: &str = "
    SELECT user_cd, subject_id, email, display_name, provider, last_login_at, created_at
    FROM users
    WHERE email = ?1 AND delete_flg = 0
    ORDER BY user_cd
    LIMIT 1;
";

/// Represents a user in the system.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    /// The numeric user code assigned on first login.
    pub user_cd: i64,
    /// The `oid` claim of the identity provider.
    pub subject_id: Option<String>,
    pub email: String,
    pub display_name: Option<String>,
    pub provider: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The identity presented by a successful login.
#[derive(Debug, Clone)]
pub struct UserLogin {
    pub email: String,
    pub subject_id: String,
    pub display_name: String,
    pub provider: String,
}

impl UserLogin {
    /// The identity used when login is disabled.
    pub fn system() -> Self {
        Self {
            email: SYSTEM_USER_EMAIL.to_string(),
            subject_id: SYSTEM_USER_SUBJECT.to_string(),
            display_name: SYSTEM_USER_NAME.to_string(),
            provider: "local".to_string(),
        }
    }
}

impl TryFrom<&Row> for User {
    type Error = CoreAccessError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let created_at = optional_text(row, 6)?
            .ok_or_else(|| CoreAccessError::DataIntegrity("created_at is null".to_string()))?;
        let last_login_at = optional_text(row, 5)?;

        Ok(User {
            user_cd: row.get(0)?,
            subject_id: optional_text(row, 1)?,
            email: row.get(2)?,
            display_name: optional_text(row, 3)?,
            provider: optional_text(row, 4)?,
            last_login_at: last_login_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

fn optional_text(row: &Row, index: usize) -> Result<Option<String>, CoreAccessError> {
    match row.get_value(index)? {
        TursoValue::Null => Ok(None),
        TursoValue::Text(s) => Ok(Some(s)),
        other => Err(CoreAccessError::DataIntegrity(format!(
            "Expected text in column {index}, got {other:?}"
        ))),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CoreAccessError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreAccessError::DataIntegrity(format!("Failed to parse date '{value}': {e}")))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Creates the `users` table. Idempotent.
pub async fn initialize_schema(db: &Database) -> Result<(), CoreAccessError> {
    let conn = db.connect()?;
    conn.execute(CREATE_USERS_TABLE, ()).await?;
    conn.execute(CREATE_USERS_EMAIL_INDEX, ()).await?;
    Ok(())
}

/// Finds an active user by email.
pub async fn get_user_by_email(db: &Database, email: &str) -> Result<Option<User>, CoreAccessError> {
    let conn = db.connect()?;
    let mut rows = conn
        .query(SELECT_ACTIVE_USER_BY_EMAIL, params![email])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(User::try_from(&row)?)),
        None => Ok(None),
    }
}

/// Records a login: inserts the user if the email is unknown, otherwise
/// refreshes their subject id, display name, provider and last login time.
pub async fn upsert_user(db: &Database, login: &UserLogin) -> Result<User, CoreAccessError> {
    let conn = db.connect()?;
    let timestamp = now();

    let existing = get_user_by_email(db, &login.email).await?;
    match existing {
        Some(user) => {
            conn.execute(
                "UPDATE users SET subject_id = ?1, display_name = ?2, provider = ?3, last_login_at = ?4
                 WHERE user_cd = ?5",
                params![
                    login.subject_id.as_str(),
                    login.display_name.as_str(),
                    login.provider.as_str(),
                    timestamp.as_str(),
                    user.user_cd
                ],
            )
            .await?;
        }
        None => {
            conn.execute(
                "INSERT INTO users (subject_id, email, display_name, provider, last_login_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    login.subject_id.as_str(),
                    login.email.as_str(),
                    login.display_name.as_str(),
                    login.provider.as_str(),
                    timestamp.as_str(),
                    timestamp.as_str()
                ],
            )
            .await?;
            info!(email = %login.email, "Registered new user");
        }
    }

    get_user_by_email(db, &login.email)
        .await?
        .ok_or_else(|| CoreAccessError::UserPersistenceFailed(login.email.clone()))
}
