use async_trait::async_trait;
use chrono::{DateTime, Utc};
use speak_core::model::{
    Attempt, AttemptId, AxisScores, Difficulty, PracticeItem, PracticeMode, Session, SessionId,
    SessionSummary, WordResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Input for creating a session row. The item sequence is fixed from this
/// point on; callers validate it against the mode before handing it over.
#[derive(Debug, Clone)]
pub struct NewSessionRecord {
    pub mode: PracticeMode,
    pub difficulty: Difficulty,
    pub items: Vec<PracticeItem>,
    pub created_at: DateTime<Utc>,
}

/// Input for appending one attempt. The repository assigns the row id and the
/// per-item ordinal atomically with the active-session check.
#[derive(Debug, Clone)]
pub struct NewAttemptRecord {
    pub session_id: SessionId,
    pub item_index: u32,
    pub transcript: String,
    pub scores: AxisScores,
    pub words: Vec<WordResult>,
    pub created_at: DateTime<Utc>,
}

/// Repository contract for sessions.
///
/// Soft-deleted sessions are invisible to every read here; their rows are
/// kept for audit only.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new active session and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn create_session(&self, record: NewSessionRecord) -> Result<SessionId, StorageError>;

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session is missing or
    /// soft-deleted, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError>;

    /// List non-deleted sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError>;

    /// Store the summary and transition the session to completed, guarded on
    /// the session still being active. The guard and the write are atomic so
    /// completion cannot race with a concurrent attempt or a second
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session is no longer active,
    /// `StorageError::NotFound` if it is missing or deleted.
    async fn finalize_session(
        &self,
        id: SessionId,
        summary: &SessionSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Transition the session to abandoned, guarded on it being active.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session is no longer active,
    /// `StorageError::NotFound` if it is missing or deleted.
    async fn abandon_session(&self, id: SessionId) -> Result<(), StorageError>;

    /// Soft-delete the session. Idempotent: deleting an already-deleted
    /// session keeps the original timestamp and succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` only if no such row exists at all.
    async fn delete_session(&self, id: SessionId, at: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Repository contract for attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append one immutable attempt. The active-session check, ordinal
    /// assignment, and insert happen atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session is missing or deleted,
    /// `StorageError::Conflict` if it is not active.
    async fn record_attempt(&self, record: NewAttemptRecord) -> Result<Attempt, StorageError>;

    /// All attempts for a session, ordered by item index then creation time.
    /// Unknown sessions yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn attempts_for_session(&self, id: SessionId) -> Result<Vec<Attempt>, StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ─────────────────────────────────────────────────
//

#[derive(Default)]
struct InMemoryState {
    sessions: HashMap<SessionId, Session>,
    attempts: Vec<Attempt>,
    next_session_id: u64,
    next_attempt_id: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// A single mutex serializes all writes, which also provides the
/// one-writer-per-session discipline the SQLite adapter gets from
/// transactions.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, record: NewSessionRecord) -> Result<SessionId, StorageError> {
        let mut state = self.lock()?;
        state.next_session_id += 1;
        let id = SessionId::new(state.next_session_id);
        let session = Session::new(
            id,
            record.mode,
            record.difficulty,
            record.items,
            record.created_at,
        )
        .map_err(ser)?;
        state.sessions.insert(id, session);
        Ok(id)
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        let state = self.lock()?;
        state
            .sessions
            .get(&id)
            .filter(|session| !session.is_deleted())
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError> {
        let state = self.lock()?;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|session| !session.is_deleted())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.id().value().cmp(&a.id().value()))
        });
        sessions.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(sessions)
    }

    async fn finalize_session(
        &self,
        id: SessionId,
        summary: &SessionSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let session = state.sessions.get_mut(&id).ok_or(StorageError::NotFound)?;
        if session.is_deleted() {
            return Err(StorageError::NotFound);
        }
        session
            .complete(summary.clone(), completed_at)
            .map_err(|_| StorageError::Conflict)
    }

    async fn abandon_session(&self, id: SessionId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let session = state.sessions.get_mut(&id).ok_or(StorageError::NotFound)?;
        if session.is_deleted() {
            return Err(StorageError::NotFound);
        }
        session.abandon().map_err(|_| StorageError::Conflict)
    }

    async fn delete_session(&self, id: SessionId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let session = state.sessions.get_mut(&id).ok_or(StorageError::NotFound)?;
        session.mark_deleted(at);
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn record_attempt(&self, record: NewAttemptRecord) -> Result<Attempt, StorageError> {
        let mut state = self.lock()?;

        let session = state
            .sessions
            .get(&record.session_id)
            .ok_or(StorageError::NotFound)?;
        if session.is_deleted() {
            return Err(StorageError::NotFound);
        }
        if session.status().is_terminal() {
            return Err(StorageError::Conflict);
        }

        let ordinal_count = state
            .attempts
            .iter()
            .filter(|attempt| {
                attempt.session_id() == record.session_id
                    && attempt.item_index() == record.item_index
            })
            .count();
        let ordinal = u32::try_from(ordinal_count + 1)
            .map_err(|_| StorageError::Serialization("ordinal overflow".into()))?;

        state.next_attempt_id += 1;
        let attempt = Attempt::from_persisted(
            AttemptId::new(state.next_attempt_id),
            record.session_id,
            record.item_index,
            ordinal,
            record.transcript,
            record.scores,
            record.words,
            record.created_at,
        )
        .map_err(ser)?;

        state.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn attempts_for_session(&self, id: SessionId) -> Result<Vec<Attempt>, StorageError> {
        let state = self.lock()?;
        let mut attempts: Vec<Attempt> = state
            .attempts
            .iter()
            .filter(|attempt| attempt.session_id() == id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| {
            a.item_index()
                .cmp(&b.item_index())
                .then(a.created_at().cmp(&b.created_at()))
                .then(a.id().cmp(&b.id()))
        });
        Ok(attempts)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self { sessions, attempts }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
