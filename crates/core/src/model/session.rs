use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::model::{Difficulty, PracticeItem, PracticeMode, SessionId, SessionSummary};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session has no practice items")]
    NoItems,

    #[error("item {index} does not match session mode {mode}")]
    ModeMismatch { index: usize, mode: PracticeMode },

    #[error("operation requires an active session, status is {status}")]
    NotActive { status: SessionStatus },

    #[error("summary and timestamps do not match session status {status}")]
    StatusShapeMismatch { status: SessionStatus },
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Lifecycle of a practice session.
///
/// `Active` is the only state accepting writes; `Completed` and `Abandoned`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    /// Storage representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    /// Terminal states accept no further attempts or transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// A practice session: a fixed item sequence plus lifecycle state.
///
/// The summary is `None` while the session is active; completing the session
/// computes it exactly once. Soft deletion hides the session from reads while
/// keeping the row for audit.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    mode: PracticeMode,
    difficulty: Difficulty,
    items: Vec<PracticeItem>,
    status: SessionStatus,
    summary: Option<SessionSummary>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Validate an item sequence against a session mode.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoItems` for an empty sequence, or
    /// `SessionError::ModeMismatch` for the first item whose variant does not
    /// match `mode`.
    pub fn validate_items(mode: PracticeMode, items: &[PracticeItem]) -> Result<(), SessionError> {
        if items.is_empty() {
            return Err(SessionError::NoItems);
        }
        for (index, item) in items.iter().enumerate() {
            if item.mode() != mode {
                return Err(SessionError::ModeMismatch { index, mode });
            }
        }
        Ok(())
    }

    /// Create a new active session over a fixed item sequence.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Session::validate_items`].
    pub fn new(
        id: SessionId,
        mode: PracticeMode,
        difficulty: Difficulty,
        items: Vec<PracticeItem>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        Self::validate_items(mode, &items)?;
        Ok(Self {
            id,
            mode,
            difficulty,
            items,
            status: SessionStatus::Active,
            summary: None,
            created_at,
            completed_at: None,
            deleted_at: None,
        })
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns item validation errors, or `SessionError::StatusShapeMismatch`
    /// if the summary/timestamp shape does not agree with the status:
    /// active sessions carry neither summary nor completion time, completed
    /// sessions carry both, abandoned sessions carry no summary.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        mode: PracticeMode,
        difficulty: Difficulty,
        items: Vec<PracticeItem>,
        status: SessionStatus,
        summary: Option<SessionSummary>,
        created_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionError> {
        Self::validate_items(mode, &items)?;

        let shape_ok = match status {
            SessionStatus::Active => summary.is_none() && completed_at.is_none(),
            SessionStatus::Completed => summary.is_some() && completed_at.is_some(),
            SessionStatus::Abandoned => summary.is_none(),
        };
        if !shape_ok {
            return Err(SessionError::StatusShapeMismatch { status });
        }

        Ok(Self {
            id,
            mode,
            difficulty,
            items,
            status,
            summary,
            created_at,
            completed_at,
            deleted_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn items(&self) -> &[PracticeItem] {
        &self.items
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        u32::try_from(self.items.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn require_active(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::Active {
            Ok(())
        } else {
            Err(SessionError::NotActive {
                status: self.status,
            })
        }
    }

    /// Transition to `Completed`, attaching the computed summary.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` if the session is already terminal.
    pub fn complete(
        &mut self,
        summary: SessionSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.require_active()?;
        self.status = SessionStatus::Completed;
        self.summary = Some(summary);
        self.completed_at = Some(completed_at);
        Ok(())
    }

    /// Transition to `Abandoned`. The summary stays empty.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` if the session is already terminal.
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        self.require_active()?;
        self.status = SessionStatus::Abandoned;
        Ok(())
    }

    /// Soft-delete the session. Idempotent: repeated calls keep the original
    /// deletion timestamp. Returns true when this call performed the delete.
    pub fn mark_deleted(&mut self, at: DateTime<Utc>) -> bool {
        if self.deleted_at.is_some() {
            return false;
        }
        self.deleted_at = Some(at);
        true
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
