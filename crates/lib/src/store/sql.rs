//! # Q&A Log SQL
//!
//! SQL strings used by the turso-backed store.

pub const CREATE_QA_LOG_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS qa_log (
        qa_log_cd INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        turn_no INTEGER NOT NULL,
        user_cd INTEGER NOT NULL,
        question_text TEXT NOT NULL,
        answer_text TEXT NOT NULL,
        resolved_turn_no INTEGER,
        registered_at TEXT NOT NULL
    );
";

pub const CREATE_QA_LOG_SESSION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_qa_log_session ON qa_log (session_id, turn_no);";

pub const CREATE_QA_LOG_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_qa_log_user ON qa_log (user_cd);";

pub const ALL_QA_LOG_SQL: &[&str] = &[
    CREATE_QA_LOG_TABLE,
    CREATE_QA_LOG_SESSION_INDEX,
    CREATE_QA_LOG_USER_INDEX,
];

const QA_LOG_COLUMNS: &str = "qa_log_cd, session_id, turn_no, user_cd, question_text, \
                              answer_text, resolved_turn_no, registered_at";

pub const FIND_TURN_NO: &str =
    "SELECT qa_log_cd FROM qa_log WHERE session_id = ?1 AND turn_no = ?2;";

pub const INSERT_QA_LOG: &str = "
    INSERT INTO qa_log (session_id, turn_no, user_cd, question_text, answer_text, registered_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6);
";

pub const FIND_LOG_POSITION: &str =
    "SELECT session_id, turn_no FROM qa_log WHERE qa_log_cd = ?1;";

pub const MARK_SESSION_RESOLVED: &str =
    "UPDATE qa_log SET resolved_turn_no = ?1 WHERE session_id = ?2;";

pub fn select_session_turns() -> String {
    format!("SELECT {QA_LOG_COLUMNS} FROM qa_log WHERE session_id = ?1 ORDER BY turn_no ASC;")
}

pub fn select_user_turns() -> String {
    format!("SELECT {QA_LOG_COLUMNS} FROM qa_log WHERE user_cd = ?1 ORDER BY session_id, turn_no;")
}
