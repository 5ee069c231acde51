use std::sync::Arc;

use tracing::{debug, info};

use speak_core::Clock;
use speak_core::aggregate::{AggregateConfig, AggregateError, summarize};
use speak_core::model::{
    Attempt, AxisScores, Difficulty, PracticeItem, PracticeMode, Session, SessionId,
    SessionSummary, WordResult,
};
use storage::repository::{
    AttemptRepository, NewAttemptRecord, NewSessionRecord, SessionRepository, StorageError,
};

use crate::error::PracticeError;

fn map_not_found(err: StorageError) -> PracticeError {
    match err {
        StorageError::NotFound => PracticeError::NotFound,
        other => PracticeError::Storage(other),
    }
}

/// Orchestrates the pronunciation practice lifecycle: start a session, record
/// scored attempts, and close the session out with a summary.
///
/// Scores arrive pre-computed from the external assessment service; this
/// service validates shape and state, persists, and aggregates. Per-session
/// write serialization is delegated to the storage layer's guarded,
/// transactional updates, so instances can be shared freely across tasks.
#[derive(Clone)]
pub struct PracticeService {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    config: AggregateConfig,
}

impl PracticeService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            sessions,
            attempts,
            config: AggregateConfig::default(),
        }
    }

    /// Override the weak-point detection knobs.
    #[must_use]
    pub fn with_config(mut self, config: AggregateConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the `InvalidState`/`NotFound` error for a guarded write that was
    /// rejected, reporting the status the session holds now.
    async fn state_error(&self, id: SessionId) -> PracticeError {
        match self.sessions.get_session(id).await {
            Ok(session) => PracticeError::InvalidState {
                status: session.status(),
            },
            Err(err) => map_not_found(err),
        }
    }

    /// Start a new session over a fixed item sequence.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Session` if the items are empty or do not
    /// match the mode, or `PracticeError::Storage` on persistence failures.
    pub async fn start_session(
        &self,
        mode: PracticeMode,
        difficulty: Difficulty,
        items: Vec<PracticeItem>,
    ) -> Result<Session, PracticeError> {
        Session::validate_items(mode, &items)?;

        let id = self
            .sessions
            .create_session(NewSessionRecord {
                mode,
                difficulty,
                items,
                created_at: self.clock.now(),
            })
            .await?;
        debug!(session = %id, %mode, "session started");

        self.sessions.get_session(id).await.map_err(map_not_found)
    }

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NotFound` for unknown or deleted sessions.
    pub async fn get_session(&self, id: SessionId) -> Result<Session, PracticeError> {
        self.sessions.get_session(id).await.map_err(map_not_found)
    }

    /// Record one scored attempt against an item of an active session.
    ///
    /// The attempt is append-only; the session summary stays untouched until
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NotFound` for unknown sessions,
    /// `PracticeError::InvalidState` unless the session is active,
    /// `PracticeError::OutOfRange` for an item index past the sequence, and
    /// score-range violations as `PracticeError::Session` wrapping the
    /// constructor error via storage.
    pub async fn record_attempt(
        &self,
        session_id: SessionId,
        item_index: u32,
        transcript: String,
        scores: AxisScores,
        words: Vec<WordResult>,
    ) -> Result<Attempt, PracticeError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await
            .map_err(map_not_found)?;

        if session.status().is_terminal() {
            return Err(PracticeError::InvalidState {
                status: session.status(),
            });
        }
        if item_index >= session.item_count() {
            return Err(PracticeError::OutOfRange {
                item_index,
                item_count: session.item_count(),
            });
        }

        let record = NewAttemptRecord {
            session_id,
            item_index,
            transcript,
            scores,
            words,
            created_at: self.clock.now(),
        };

        match self.attempts.record_attempt(record).await {
            Ok(attempt) => {
                debug!(
                    session = %session_id,
                    item = item_index,
                    ordinal = attempt.ordinal(),
                    "attempt recorded"
                );
                Ok(attempt)
            }
            // Lost the race against a concurrent completion/abandonment.
            Err(StorageError::Conflict) => Err(self.state_error(session_id).await),
            Err(err) => Err(map_not_found(err)),
        }
    }

    /// Complete an active session: aggregate all attempts into a summary,
    /// persist it, and transition the status — atomically, commit-or-fail.
    ///
    /// Completion is deterministic over the attempts recorded so far and is
    /// never recomputed afterwards; calling this twice yields
    /// `PracticeError::InvalidState` on the second call.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NotFound` for unknown sessions,
    /// `PracticeError::InvalidState` unless the session is active,
    /// `PracticeError::EmptySession` when no attempts exist (the session
    /// stays active), and `PracticeError::DataIntegrity` if persisted attempt
    /// data violates score invariants.
    pub async fn complete_session(
        &self,
        session_id: SessionId,
    ) -> Result<SessionSummary, PracticeError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await
            .map_err(map_not_found)?;

        if session.status().is_terminal() {
            return Err(PracticeError::InvalidState {
                status: session.status(),
            });
        }

        let attempts = self.attempts.attempts_for_session(session_id).await?;
        if attempts.is_empty() {
            return Err(PracticeError::EmptySession);
        }

        let summary = summarize(&attempts, &self.config).map_err(|err| match err {
            AggregateError::NoAttempts => PracticeError::EmptySession,
            other => PracticeError::DataIntegrity(other),
        })?;

        let completed_at = self.clock.now();
        match self
            .sessions
            .finalize_session(session_id, &summary, completed_at)
            .await
        {
            Ok(()) => {
                info!(
                    session = %session_id,
                    attempts = summary.total_attempts(),
                    overall = summary.overall_avg(),
                    "session completed"
                );
                Ok(summary)
            }
            Err(StorageError::Conflict) => Err(self.state_error(session_id).await),
            Err(err) => Err(map_not_found(err)),
        }
    }

    /// Abandon an active session. Terminal; no summary is computed and no
    /// further attempts are accepted.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NotFound` for unknown sessions and
    /// `PracticeError::InvalidState` if the session is already terminal.
    pub async fn abandon_session(&self, session_id: SessionId) -> Result<(), PracticeError> {
        match self.sessions.abandon_session(session_id).await {
            Ok(()) => {
                info!(session = %session_id, "session abandoned");
                Ok(())
            }
            Err(StorageError::Conflict) => Err(self.state_error(session_id).await),
            Err(err) => Err(map_not_found(err)),
        }
    }

    /// Soft-delete a session. Idempotent; the row is retained for audit but
    /// disappears from every read and list.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NotFound` only when no such session ever
    /// existed.
    pub async fn delete_session(&self, session_id: SessionId) -> Result<(), PracticeError> {
        self.sessions
            .delete_session(session_id, self.clock.now())
            .await
            .map_err(map_not_found)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
