//! # Turso Q&A Store
//!
//! `QaStore` backed by a local turso (SQLite-compatible) database. Each write
//! operation runs as a self-contained transaction on a fresh connection, the
//! way a stored procedure would on a server database.

use super::{
    invalid_argument, sql, summarize_sessions, QaStore, ERR_DUPLICATE_TURN, ERR_LOG_NOT_FOUND,
    PROC_MARK_RESOLVED_QA, PROC_REGISTER_QA_LOG,
};
use crate::{
    errors::StoreError,
    types::{QaTurn, SessionSummary, TurnRecord},
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::{
    fmt::{self, Debug},
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use turso::{params, Connection, Database, Row, Value as TursoValue};

/// A `QaStore` over a turso database.
///
/// Cloning shares the same database and the same writer lock.
#[derive(Clone)]
pub struct TursoQaStore {
    db: Database,
    write_lock: Arc<Mutex<()>>,
}

impl TursoQaStore {
    /// Opens (or creates) the database at `db_path`. Use `":memory:"` for an
    /// isolated in-memory database.
    pub async fn new(db_path: &str) -> Result<Self, StoreError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self::from_database(db))
    }

    /// Wraps an already opened database, e.g. one shared with the user
    /// directory.
    pub fn from_database(db: Database) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates the `qa_log` table and its indexes. Idempotent.
    pub async fn initialize_schema(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        for statement in sql::ALL_QA_LOG_SQL {
            conn.execute(statement, ()).await?;
        }
        Ok(())
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        self.db
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn register_turn_body(
        conn: &Connection,
        turn: &TurnRecord,
    ) -> Result<i64, StoreError> {
        let mut existing = conn
            .query(
                sql::FIND_TURN_NO,
                params![turn.session_id.as_str(), turn.turn_no],
            )
            .await?;
        if existing.next().await?.is_some() {
            return Err(StoreError::Procedure {
                procedure: PROC_REGISTER_QA_LOG,
                code: ERR_DUPLICATE_TURN,
                message: format!(
                    "turn {} already exists for session {}",
                    turn.turn_no, turn.session_id
                ),
            });
        }
        drop(existing);

        let registered_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        conn.execute(
            sql::INSERT_QA_LOG,
            params![
                turn.session_id.as_str(),
                turn.turn_no,
                turn.user_cd,
                turn.question.as_str(),
                turn.answer.as_str(),
                registered_at
            ],
        )
        .await?;

        // Re-read by the natural key to obtain the generated id.
        let mut rows = conn
            .query(
                sql::FIND_TURN_NO,
                params![turn.session_id.as_str(), turn.turn_no],
            )
            .await?;
        let row = rows.next().await?.ok_or_else(|| {
            StoreError::DataIntegrity(format!(
                "inserted turn {} of session {} could not be read back",
                turn.turn_no, turn.session_id
            ))
        })?;
        integer_column(&row, 0, "qa_log_cd")
    }

    async fn mark_resolved_body(conn: &Connection, qa_log_cd: i64) -> Result<(), StoreError> {
        let mut rows = conn
            .query(sql::FIND_LOG_POSITION, params![qa_log_cd])
            .await?;
        let row = rows.next().await?.ok_or_else(|| StoreError::Procedure {
            procedure: PROC_MARK_RESOLVED_QA,
            code: ERR_LOG_NOT_FOUND,
            message: format!("qa_log_cd {qa_log_cd} does not exist"),
        })?;
        let session_id = text_column(&row, 0, "session_id")?;
        let turn_no = integer_column(&row, 1, "turn_no")?;
        drop(rows);

        conn.execute(
            sql::MARK_SESSION_RESOLVED,
            params![turn_no, session_id.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn query_turns(&self, query: &str, key: TursoValue) -> Result<Vec<QaTurn>, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn.query(query, vec![key]).await?;
        let mut turns = Vec::new();
        while let Some(row) = rows.next().await? {
            turns.push(row_to_turn(&row)?);
        }
        Ok(turns)
    }
}

/// Commits on success and rolls back on failure, returning the body's result.
async fn finish<T>(conn: &Connection, result: Result<T, StoreError>) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            conn.execute("COMMIT", ()).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                error!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}

impl Debug for TursoQaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TursoQaStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl QaStore for TursoQaStore {
    async fn register_turn(&self, turn: &TurnRecord) -> Result<i64, StoreError> {
        if turn.session_id.trim().is_empty() {
            return Err(invalid_argument(PROC_REGISTER_QA_LOG, "session_id is empty"));
        }
        if turn.turn_no < 1 {
            return Err(invalid_argument(
                PROC_REGISTER_QA_LOG,
                "turn_no must be at least 1",
            ));
        }

        let _guard = self.write_lock.lock().await;
        let conn = self.connect()?;
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = Self::register_turn_body(&conn, turn).await;
        let qa_log_cd = finish(&conn, result).await?;

        info!(
            session_id = %turn.session_id,
            turn_no = turn.turn_no,
            qa_log_cd,
            "Registered QA log"
        );
        Ok(qa_log_cd)
    }

    async fn mark_resolved(&self, qa_log_cd: i64) -> Result<(), StoreError> {
        if qa_log_cd < 1 {
            return Err(invalid_argument(
                PROC_MARK_RESOLVED_QA,
                "qa_log_cd must be positive",
            ));
        }

        let _guard = self.write_lock.lock().await;
        let conn = self.connect()?;
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = Self::mark_resolved_body(&conn, qa_log_cd).await;
        finish(&conn, result).await?;

        info!(qa_log_cd, "Marked session resolved");
        Ok(())
    }

    async fn get_session_turns(&self, session_id: &str) -> Result<Vec<QaTurn>, StoreError> {
        debug!(session_id = %session_id, "Loading session turns");
        self.query_turns(
            &sql::select_session_turns(),
            TursoValue::Text(session_id.to_string()),
        )
        .await
    }

    async fn get_user_sessions(
        &self,
        user_cd: i64,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let turns = self
            .query_turns(&sql::select_user_turns(), TursoValue::Integer(user_cd))
            .await?;
        Ok(summarize_sessions(&turns, limit))
    }
}

fn row_to_turn(row: &Row) -> Result<QaTurn, StoreError> {
    let registered_at = text_column(row, 7, "registered_at")?;
    let registered_at = DateTime::parse_from_rfc3339(&registered_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::DataIntegrity(format!(
                "Failed to parse registered_at '{registered_at}': {e}"
            ))
        })?;

    let resolved_turn_no = match row.get_value(6)? {
        TursoValue::Null => None,
        TursoValue::Integer(n) => Some(n),
        other => {
            return Err(StoreError::DataIntegrity(format!(
                "resolved_turn_no has unexpected value {other:?}"
            )))
        }
    };

    Ok(QaTurn {
        qa_log_cd: integer_column(row, 0, "qa_log_cd")?,
        session_id: text_column(row, 1, "session_id")?,
        turn_no: integer_column(row, 2, "turn_no")?,
        user_cd: integer_column(row, 3, "user_cd")?,
        question_text: text_column(row, 4, "question_text")?,
        answer_text: text_column(row, 5, "answer_text")?,
        resolved_turn_no,
        registered_at,
    })
}

fn integer_column(row: &Row, index: usize, name: &str) -> Result<i64, StoreError> {
    match row.get_value(index)? {
        TursoValue::Integer(n) => Ok(n),
        other => Err(StoreError::DataIntegrity(format!(
            "{name} is not an integer: {other:?}"
        ))),
    }
}

fn text_column(row: &Row, index: usize, name: &str) -> Result<String, StoreError> {
    match row.get_value(index)? {
        TursoValue::Text(s) => Ok(s),
        other => Err(StoreError::DataIntegrity(format!(
            "{name} is not text: {other:?}"
        ))),
    }
}
