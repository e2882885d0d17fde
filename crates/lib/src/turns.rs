//! # Session Turn Tracker
//!
//! Hands out the next turn number of a conversation. The counter for a session
//! is seeded lazily from the persisted history on first use, so a restart only
//! costs one extra query per active session.

use crate::{errors::StoreError, store::QaStore};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::debug;

/// The last issued turn number of one session; `None` until seeded.
type SessionCounter = Arc<Mutex<Option<i64>>>;

#[derive(Debug)]
pub struct TurnTracker {
    store: Arc<dyn QaStore>,
    sessions: Mutex<HashMap<String, SessionCounter>>,
}

impl TurnTracker {
    pub fn new(store: Arc<dyn QaStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the next turn number for `session_id`.
    ///
    /// Calls for the same session are serialized, and each returns a distinct
    /// number one greater than the previous. If seeding from the store fails
    /// the session stays unseeded and the next call retries.
    pub async fn next_turn(&self, session_id: &str) -> Result<i64, StoreError> {
        let counter = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .clone()
        };

        let mut last = counter.lock().await;
        let current = match *last {
            Some(n) => n,
            None => {
                let seeded = self
                    .store
                    .get_session_turns(session_id)
                    .await?
                    .iter()
                    .map(|t| t.turn_no)
                    .max()
                    .unwrap_or(0);
                debug!(session_id = %session_id, seeded, "Seeded turn counter");
                seeded
            }
        };

        let next = current + 1;
        *last = Some(next);
        Ok(next)
    }
}
