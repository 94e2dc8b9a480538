//! Append-only conversation log bound to at most one backend session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::api::{QueryResponse, ReasoningStep};
use crate::error::StoreError;

/// One query/response pair plus its reasoning trace and quality score.
///
/// Turns are immutable after creation and removed only by a full clear.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub quality_score: Option<f64>,
    pub reasoning_steps: Vec<ReasoningStep>,
}

impl ConversationTurn {
    /// Build a turn from the submitted query text and the backend response.
    pub fn from_response(query: impl Into<String>, response: &QueryResponse) -> Self {
        Self {
            query: query.into(),
            response: response.response.clone(),
            timestamp: Utc::now(),
            quality_score: Some(response.metadata.quality_score),
            reasoning_steps: response.reasoning_steps.clone(),
        }
    }
}

/// Ordered, append-only log of conversation turns.
///
/// Holds exactly one session binding or none. Once bound, the id is
/// immutable until [`ConversationStore::clear`].
#[derive(Debug, Default)]
pub struct ConversationStore {
    session_id: Option<String>,
    turns: Vec<ConversationTurn>,
}

impl ConversationStore {
    /// Create an empty, unbound store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bound session id, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of turns in the log.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the log holds no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a turn to the tail of the log. Existing turns are never
    /// reordered or removed.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Bind the store to a session id.
    ///
    /// Allowed only when unbound; re-offering the already-bound id is a
    /// no-op. A different id is a contract violation and fails loudly.
    pub fn bind_session(&mut self, id: impl Into<String>) -> Result<(), StoreError> {
        let id = id.into();
        match &self.session_id {
            None => {
                debug!(session = %id, "Session bound");
                self.session_id = Some(id);
                Ok(())
            }
            Some(bound) if *bound == id => Ok(()),
            Some(bound) => Err(StoreError::SessionRebound {
                bound: bound.clone(),
                offered: id,
            }),
        }
    }

    /// Atomically empty the log and unbind the session.
    pub fn clear(&mut self) {
        debug!(
            turns = self.turns.len(),
            session = ?self.session_id,
            "Conversation cleared"
        );
        self.turns.clear();
        self.session_id = None;
    }
}
