//! Query submission lifecycle: validation, in-flight tracking, stale
//! completion discard, and atomic append-on-success.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::api::{QueryRequest, QueryResponse, SiraClient};
use crate::config::QueryConfig;
use crate::conversation::{ConversationStore, ConversationTurn};
use crate::error::{QueryError, SubmitRejection};
use crate::trace::LatestResult;

/// Token identifying one submission attempt.
///
/// A completion is applied only when its token matches the controller's
/// current in-flight token; anything else is stale and discarded. Tokens
/// are never reused within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// What the controller is doing right now.
#[derive(Debug)]
enum Phase {
    Idle,
    Submitting {
        token: RequestToken,
        query: String,
        started_at: Instant,
    },
}

/// A submission the controller has accepted and expects a completion for.
#[derive(Debug)]
pub struct PendingSubmission {
    pub token: RequestToken,
    pub request: QueryRequest,
}

/// Outcome of feeding a completion back into the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Current-token success: turn appended, latest result replaced.
    Applied,
    /// Current-token failure: error recorded, store untouched.
    Failed,
    /// Token superseded by a clear or an earlier completion; no state
    /// was mutated. Never surfaced to the user.
    Stale,
}

/// Cosmetic progress readout while a submission is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitProgress {
    pub elapsed: Duration,
    /// Set once elapsed time crosses the configured advisory threshold.
    pub slow: bool,
}

/// State machine driving query submission.
///
/// Owns the [`ConversationStore`] exclusively; nothing else writes to it.
/// The machine cycles `Idle -> Submitting -> Idle`; success and failure
/// are recorded as the latest result and the current error on the way
/// back to `Idle`, so the next submission is immediately possible.
#[derive(Debug)]
pub struct SubmissionController {
    phase: Phase,
    next_token: u64,
    store: ConversationStore,
    last_result: Option<LatestResult>,
    last_error: Option<QueryError>,
    config: QueryConfig,
}

impl SubmissionController {
    /// Create an idle controller with an empty, unbound conversation.
    pub fn new(config: QueryConfig) -> Self {
        Self {
            phase: Phase::Idle,
            next_token: 0,
            store: ConversationStore::new(),
            last_result: None,
            last_error: None,
            config,
        }
    }

    /// The conversation log.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// The bound session id, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.store.session_id()
    }

    /// The latest successful result, if any.
    pub fn latest_result(&self) -> Option<&LatestResult> {
        self.last_result.as_ref()
    }

    /// The current error, if the most recent submission failed.
    pub fn last_error(&self) -> Option<&QueryError> {
        self.last_error.as_ref()
    }

    /// Whether a submission is in flight.
    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, Phase::Submitting { .. })
    }

    /// The configured submission ceiling.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Validate and start a submission.
    ///
    /// Rejects empty/whitespace-only text and refuses to start while one
    /// is already in flight; both rejections leave all state untouched and
    /// never reach the network. On acceptance the controller moves to
    /// `Submitting` and hands back the request to send, carrying the bound
    /// session id when there is one.
    pub fn begin_submit(&mut self, text: &str) -> Result<PendingSubmission, SubmitRejection> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SubmitRejection::EmptyQuery);
        }
        if self.is_submitting() {
            return Err(SubmitRejection::InFlight);
        }

        let token = RequestToken(self.next_token);
        self.next_token += 1;

        let request = QueryRequest::new(
            trimmed,
            self.store.session_id().map(str::to_string),
        );

        self.phase = Phase::Submitting {
            token,
            query: trimmed.to_string(),
            started_at: Instant::now(),
        };

        debug!(token = token.0, session = ?request.session_id, "Submission started");

        Ok(PendingSubmission { token, request })
    }

    /// Feed a completion back into the controller.
    ///
    /// A completion whose token is not the current in-flight token is
    /// stale: its request was superseded by a clear (or the controller was
    /// never waiting on it) and it must not mutate anything, success or
    /// failure alike.
    pub fn complete(
        &mut self,
        token: RequestToken,
        outcome: Result<QueryResponse, QueryError>,
    ) -> Completion {
        let (query, started_at) = match &self.phase {
            Phase::Submitting {
                token: current,
                query,
                started_at,
            } if *current == token => (query.clone(), *started_at),
            _ => {
                debug!(token = token.0, "Stale completion discarded");
                return Completion::Stale;
            }
        };

        self.phase = Phase::Idle;

        match outcome {
            Ok(response) => {
                if self.store.session_id().is_none() {
                    // First successful response binds the session; the
                    // store is unbound here so this cannot fail.
                    let _ = self.store.bind_session(response.session_id.clone());
                } else if self.store.session_id() != Some(response.session_id.as_str()) {
                    warn!(
                        bound = ?self.store.session_id(),
                        returned = %response.session_id,
                        "Backend returned a different session id; keeping existing binding"
                    );
                }

                self.store
                    .append(ConversationTurn::from_response(query, &response));
                self.last_result = Some(LatestResult::new(response));
                self.last_error = None;

                info!(
                    token = token.0,
                    turns = self.store.len(),
                    latency_ms = started_at.elapsed().as_millis(),
                    "Submission succeeded"
                );

                Completion::Applied
            }
            Err(error) => {
                info!(token = token.0, error = %error, "Submission failed");
                self.last_error = Some(error);
                Completion::Failed
            }
        }
    }

    /// Clear the conversation.
    ///
    /// Atomically empties the log, unbinds the session, invalidates any
    /// in-flight token so a late completion is discarded, and drops the
    /// latest result and current error.
    pub fn clear(&mut self) {
        if let Phase::Submitting { token, .. } = &self.phase {
            debug!(token = token.0, "In-flight submission invalidated by clear");
        }
        self.phase = Phase::Idle;
        self.store.clear();
        self.last_result = None;
        self.last_error = None;
    }

    /// Cosmetic elapsed/slow readout while submitting; `None` when idle.
    /// Has no effect on transitions.
    pub fn progress(&self, now: Instant) -> Option<SubmitProgress> {
        match &self.phase {
            Phase::Submitting { started_at, .. } => {
                let elapsed = now.saturating_duration_since(*started_at);
                Some(SubmitProgress {
                    elapsed,
                    slow: elapsed >= self.config.slow_threshold(),
                })
            }
            Phase::Idle => None,
        }
    }
}

/// Drive one submission end to end against the backend.
///
/// Enforces the configured wall-clock ceiling with [`tokio::time::timeout`]
/// so the abort fires deterministically; an elapsed ceiling is classified
/// as [`QueryError::Timeout`], distinct from a backend-returned error. The
/// outcome is fed back through [`SubmissionController::complete`], which
/// applies the stale-token guard.
pub async fn run_submission(
    controller: &mut SubmissionController,
    client: &SiraClient,
    text: &str,
) -> Result<Completion, SubmitRejection> {
    let pending = controller.begin_submit(text)?;
    let ceiling = controller.timeout();

    let outcome = match tokio::time::timeout(ceiling, client.submit_query(&pending.request)).await
    {
        Ok(result) => result,
        Err(_) => Err(QueryError::Timeout {
            timeout_ms: ceiling.as_millis() as u64,
        }),
    };

    Ok(controller.complete(pending.token, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ReasoningStep, ResponseMetadata};

    fn controller() -> SubmissionController {
        SubmissionController::new(QueryConfig {
            timeout_ms: 60_000,
            slow_threshold_ms: 100,
        })
    }

    fn response(session_id: &str, text: &str) -> QueryResponse {
        QueryResponse {
            response: text.to_string(),
            session_id: session_id.to_string(),
            reasoning_steps: vec![ReasoningStep::new(1, "compute").with_result(text)],
            metadata: ResponseMetadata {
                quality_score: 0.95,
                patterns_retrieved_count: None,
            },
        }
    }

    #[test]
    fn test_first_success_binds_session_and_appends() {
        let mut ctl = controller();
        let pending = ctl.begin_submit("What is 2 + 2?").unwrap();
        assert!(ctl.is_submitting());

        let completion = ctl.complete(pending.token, Ok(response("s1", "4")));

        assert_eq!(completion, Completion::Applied);
        assert!(!ctl.is_submitting());
        assert_eq!(ctl.session_id(), Some("s1"));
        assert_eq!(ctl.store().len(), 1);
        let turn = &ctl.store().turns()[0];
        assert_eq!(turn.query, "What is 2 + 2?");
        assert_eq!(turn.response, "4");
        assert_eq!(turn.quality_score, Some(0.95));
        assert!(ctl.latest_result().is_some());
        assert!(ctl.last_error().is_none());
    }

    #[test]
    fn test_second_submission_carries_bound_session() {
        let mut ctl = controller();
        let first = ctl.begin_submit("What is 2 + 2?").unwrap();
        assert!(first.request.session_id.is_none());
        ctl.complete(first.token, Ok(response("s1", "4")));

        let second = ctl.begin_submit("And times 3?").unwrap();
        assert_eq!(second.request.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_empty_query_is_rejected_without_state_change() {
        let mut ctl = controller();
        assert_eq!(
            ctl.begin_submit("").unwrap_err(),
            SubmitRejection::EmptyQuery
        );
        assert_eq!(
            ctl.begin_submit("   \t\n").unwrap_err(),
            SubmitRejection::EmptyQuery
        );
        assert!(!ctl.is_submitting());
        assert!(ctl.store().is_empty());
    }

    #[test]
    fn test_submit_while_in_flight_is_rejected() {
        let mut ctl = controller();
        let pending = ctl.begin_submit("first").unwrap();
        assert_eq!(
            ctl.begin_submit("second").unwrap_err(),
            SubmitRejection::InFlight
        );
        // The original submission is still the live one
        assert_eq!(
            ctl.complete(pending.token, Ok(response("s1", "ok"))),
            Completion::Applied
        );
    }

    #[test]
    fn test_failure_records_error_and_leaves_store_unchanged() {
        let mut ctl = controller();
        let first = ctl.begin_submit("q1").unwrap();
        ctl.complete(first.token, Ok(response("s1", "a1")));

        let second = ctl.begin_submit("q2").unwrap();
        let completion = ctl.complete(
            second.token,
            Err(QueryError::Server {
                status: 500,
                message: "boom".to_string(),
            }),
        );

        assert_eq!(completion, Completion::Failed);
        assert!(!ctl.is_submitting());
        assert_eq!(ctl.store().len(), 1);
        assert!(matches!(
            ctl.last_error(),
            Some(QueryError::Server { status: 500, .. })
        ));
        // Session binding survives a failed submission
        assert_eq!(ctl.session_id(), Some("s1"));
    }

    #[test]
    fn test_timeout_failure_ends_idle_with_history_unchanged() {
        let mut ctl = controller();
        let before = ctl.store().len();
        let pending = ctl.begin_submit("slow question").unwrap();

        let completion = ctl.complete(
            pending.token,
            Err(QueryError::Timeout { timeout_ms: 60_000 }),
        );

        assert_eq!(completion, Completion::Failed);
        assert!(!ctl.is_submitting());
        assert_eq!(ctl.store().len(), before);
        assert!(matches!(ctl.last_error(), Some(QueryError::Timeout { .. })));
    }

    #[test]
    fn test_error_cleared_on_next_success() {
        let mut ctl = controller();
        let first = ctl.begin_submit("q1").unwrap();
        ctl.complete(
            first.token,
            Err(QueryError::NetworkUnreachable {
                message: "refused".to_string(),
            }),
        );
        assert!(ctl.last_error().is_some());

        let second = ctl.begin_submit("q2").unwrap();
        ctl.complete(second.token, Ok(response("s1", "a2")));
        assert!(ctl.last_error().is_none());
    }

    #[test]
    fn test_stale_completion_after_clear_is_discarded() {
        let mut ctl = controller();
        let first = ctl.begin_submit("q1").unwrap();
        ctl.complete(first.token, Ok(response("s1", "a1")));

        let pending = ctl.begin_submit("q2").unwrap();
        ctl.clear();
        assert!(ctl.store().is_empty());
        assert!(ctl.session_id().is_none());

        // The aborted request completes late; it must not resurrect the
        // cleared conversation.
        let completion = ctl.complete(pending.token, Ok(response("s1", "late")));
        assert_eq!(completion, Completion::Stale);
        assert!(ctl.store().is_empty());
        assert!(ctl.session_id().is_none());
        assert!(ctl.latest_result().is_none());
    }

    #[test]
    fn test_stale_failure_is_also_discarded() {
        let mut ctl = controller();
        let pending = ctl.begin_submit("q1").unwrap();
        ctl.clear();

        let completion = ctl.complete(
            pending.token,
            Err(QueryError::Timeout { timeout_ms: 60_000 }),
        );
        assert_eq!(completion, Completion::Stale);
        assert!(ctl.last_error().is_none());
    }

    #[test]
    fn test_duplicate_completion_is_stale() {
        let mut ctl = controller();
        let pending = ctl.begin_submit("q1").unwrap();
        assert_eq!(
            ctl.complete(pending.token, Ok(response("s1", "a1"))),
            Completion::Applied
        );
        assert_eq!(
            ctl.complete(pending.token, Ok(response("s1", "again"))),
            Completion::Stale
        );
        assert_eq!(ctl.store().len(), 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut ctl = controller();
        for (q, a) in [("q1", "a1"), ("q2", "a2")] {
            let pending = ctl.begin_submit(q).unwrap();
            ctl.complete(pending.token, Ok(response("s1", a)));
        }
        assert_eq!(ctl.store().len(), 2);
        assert_eq!(ctl.session_id(), Some("s1"));

        ctl.clear();

        assert!(ctl.store().is_empty());
        assert!(ctl.session_id().is_none());
        assert!(ctl.latest_result().is_none());
        assert!(ctl.last_error().is_none());
        assert!(!ctl.is_submitting());
    }

    #[test]
    fn test_new_session_binds_after_clear() {
        let mut ctl = controller();
        let first = ctl.begin_submit("q1").unwrap();
        ctl.complete(first.token, Ok(response("s1", "a1")));
        ctl.clear();

        let second = ctl.begin_submit("q2").unwrap();
        assert!(second.request.session_id.is_none());
        ctl.complete(second.token, Ok(response("s2", "a2")));
        assert_eq!(ctl.session_id(), Some("s2"));
    }

    #[test]
    fn test_progress_reports_elapsed_and_slow() {
        let mut ctl = controller();
        assert!(ctl.progress(Instant::now()).is_none());

        let _pending = ctl.begin_submit("q1").unwrap();
        let progress = ctl.progress(Instant::now()).unwrap();
        assert!(!progress.slow);

        // slow_threshold_ms is 100 in the test config
        let later = Instant::now() + Duration::from_millis(500);
        let progress = ctl.progress(later).unwrap();
        assert!(progress.slow);
        assert!(progress.elapsed >= Duration::from_millis(100));
    }

    #[test]
    fn test_submitted_text_is_trimmed() {
        let mut ctl = controller();
        let pending = ctl.begin_submit("  What is 2 + 2?  ").unwrap();
        assert_eq!(pending.request.query, "What is 2 + 2?");

        ctl.complete(pending.token, Ok(response("s1", "4")));
        assert_eq!(ctl.store().turns()[0].query, "What is 2 + 2?");
    }
}
