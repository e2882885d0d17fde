use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use qachat::{
    errors::{ChatError, StoreError},
    store::{
        summarize_sessions, ERR_DUPLICATE_TURN, ERR_LOG_NOT_FOUND, PROC_MARK_RESOLVED_QA,
        PROC_REGISTER_QA_LOG,
    },
    types::{ChatRequest, QaTurn, SessionSummary, TurnRecord},
    upstream::{ChatUpstream, EventStream, UpstreamEvent},
    QaStore, TursoQaStore,
};
use std::sync::{Arc, Mutex};
use turso::Database;

// --- Test Setup ---

/// A helper struct to manage database creation for each test.
pub struct TestSetup {
    pub db: Database,
    pub store: TursoQaStore,
}

impl TestSetup {
    /// Creates a new, isolated in-memory database with the user and Q&A log
    /// tables.
    pub async fn new() -> Result<Self> {
        let db = turso::Builder::new_local(":memory:").build().await?;
        core_access::initialize_schema(&db).await?;
        let store = TursoQaStore::from_database(db.clone());
        store.initialize_schema().await?;
        Ok(Self { db, store })
    }
}

// --- Mock Chat Upstream ---

/// One scripted step of a mock upstream answer.
#[derive(Clone, Debug)]
pub enum MockStep {
    Event(UpstreamEvent),
    /// Breaks the connection mid-stream.
    Disconnect(String),
}

impl MockStep {
    pub fn text(token: &str) -> Self {
        MockStep::Event(UpstreamEvent::Text(token.to_string()))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockChatUpstream {
    steps: Arc<Mutex<Vec<MockStep>>>,
    reject_status: Arc<Mutex<Option<u16>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChatUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request with the given steps.
    pub fn with_steps(steps: Vec<MockStep>) -> Self {
        let mock = Self::new();
        *mock.steps.lock().unwrap() = steps;
        mock
    }

    /// Answers every request with the given text tokens.
    pub fn with_tokens(tokens: &[&str]) -> Self {
        Self::with_steps(tokens.iter().map(|t| MockStep::text(t)).collect())
    }

    /// Makes `stream_chat` fail as if the upstream answered with `status`.
    pub fn reject_with(&self, status: u16) {
        *self.reject_status.lock().unwrap() = Some(status);
    }

    /// Retrieves the recorded requests for assertion.
    pub fn get_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatUpstream for MockChatUpstream {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, ChatError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(status) = *self.reject_status.lock().unwrap() {
            return Err(ChatError::UpstreamStatus {
                status,
                body: "MockChatUpstream rejected the request".to_string(),
            });
        }

        let items: Vec<Result<UpstreamEvent, ChatError>> = self
            .steps
            .lock()
            .unwrap()
            .iter()
            .map(|step| match step {
                MockStep::Event(event) => Ok(event.clone()),
                MockStep::Disconnect(reason) => Err(ChatError::StreamInterrupted(reason.clone())),
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

// --- Mock Q&A Store ---

/// An in-memory `QaStore` with failure injection.
#[derive(Clone, Debug, Default)]
pub struct MockQaStore {
    turns: Arc<Mutex<Vec<QaTurn>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockQaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `register_turn` fail.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Inserts a turn directly, bypassing the write path.
    pub fn seed_turn(&self, session_id: &str, turn_no: i64, user_cd: i64, question: &str) -> i64 {
        let mut turns = self.turns.lock().unwrap();
        let qa_log_cd = turns.len() as i64 + 1;
        turns.push(QaTurn {
            qa_log_cd,
            session_id: session_id.to_string(),
            turn_no,
            user_cd,
            question_text: question.to_string(),
            answer_text: format!("answer to {question}"),
            resolved_turn_no: None,
            registered_at: Utc::now(),
        });
        qa_log_cd
    }

    /// Retrieves every stored turn for assertion.
    pub fn get_turns(&self) -> Vec<QaTurn> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait]
impl QaStore for MockQaStore {
    async fn register_turn(&self, turn: &TurnRecord) -> Result<i64, StoreError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::OperationFailed(
                "MockQaStore: writes disabled".to_string(),
            ));
        }

        let mut turns = self.turns.lock().unwrap();
        if turns
            .iter()
            .any(|t| t.session_id == turn.session_id && t.turn_no == turn.turn_no)
        {
            return Err(StoreError::Procedure {
                procedure: PROC_REGISTER_QA_LOG,
                code: ERR_DUPLICATE_TURN,
                message: "duplicate turn".to_string(),
            });
        }

        let qa_log_cd = turns.len() as i64 + 1;
        turns.push(QaTurn {
            qa_log_cd,
            session_id: turn.session_id.clone(),
            turn_no: turn.turn_no,
            user_cd: turn.user_cd,
            question_text: turn.question.clone(),
            answer_text: turn.answer.clone(),
            resolved_turn_no: None,
            registered_at: Utc::now(),
        });
        Ok(qa_log_cd)
    }

    async fn mark_resolved(&self, qa_log_cd: i64) -> Result<(), StoreError> {
        let mut turns = self.turns.lock().unwrap();
        let (session_id, turn_no) = turns
            .iter()
            .find(|t| t.qa_log_cd == qa_log_cd)
            .map(|t| (t.session_id.clone(), t.turn_no))
            .ok_or(StoreError::Procedure {
                procedure: PROC_MARK_RESOLVED_QA,
                code: ERR_LOG_NOT_FOUND,
                message: "log not found".to_string(),
            })?;
        for turn in turns.iter_mut().filter(|t| t.session_id == session_id) {
            turn.resolved_turn_no = Some(turn_no);
        }
        Ok(())
    }

    async fn get_session_turns(&self, session_id: &str) -> Result<Vec<QaTurn>, StoreError> {
        let mut turns: Vec<QaTurn> = self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.turn_no);
        Ok(turns)
    }

    async fn get_user_sessions(
        &self,
        user_cd: i64,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let turns: Vec<QaTurn> = self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_cd == user_cd)
            .cloned()
            .collect();
        Ok(summarize_sessions(&turns, limit))
    }
}
