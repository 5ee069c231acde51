use chrono::{DateTime, Utc};
use std::sync::Arc;

use speak_core::model::{
    Difficulty, PracticeMode, Session, SessionId, SessionStatus, SessionSummary,
};
use storage::repository::{SessionRepository, StorageError};

use crate::error::PracticeError;

/// Presentation-agnostic list item for a practice session.
///
/// This is intentionally **not** a UI view-model: no pre-formatted strings,
/// no localization assumptions. Summary-derived fields are present only for
/// completed sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOverview {
    pub id: SessionId,
    pub mode: PracticeMode,
    pub difficulty: Difficulty,
    pub status: SessionStatus,
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_attempts: Option<u32>,
    pub overall_avg: Option<f64>,
}

impl SessionOverview {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id(),
            mode: session.mode(),
            difficulty: session.difficulty(),
            status: session.status(),
            item_count: session.item_count(),
            created_at: session.created_at(),
            completed_at: session.completed_at(),
            total_attempts: session.summary().map(SessionSummary::total_attempts),
            overall_avg: session.summary().map(SessionSummary::overall_avg),
        }
    }
}

/// Read-side facade over practice history that hides repositories from the
/// caller.
#[derive(Clone)]
pub struct PracticeHistoryService {
    sessions: Arc<dyn SessionRepository>,
}

impl PracticeHistoryService {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self { sessions }
    }

    /// List recent sessions, newest first. Soft-deleted sessions never
    /// appear.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` on repository failures.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<SessionOverview>, PracticeError> {
        let sessions = self.sessions.list_sessions(limit).await?;
        Ok(sessions.iter().map(SessionOverview::from_session).collect())
    }

    /// Fetch the summary of a completed session.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NotFound` for unknown or deleted sessions, and
    /// `PracticeError::InvalidState` when the session has no summary (active
    /// or abandoned).
    pub async fn get_summary(&self, id: SessionId) -> Result<SessionSummary, PracticeError> {
        let session = self.sessions.get_session(id).await.map_err(|err| match err {
            StorageError::NotFound => PracticeError::NotFound,
            other => PracticeError::Storage(other),
        })?;

        session
            .summary()
            .cloned()
            .ok_or(PracticeError::InvalidState {
                status: session.status(),
            })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::PracticeService;
    use speak_core::model::{AxisScores, PracticeItem, ReadAloudItem};
    use speak_core::time::fixed_clock;
    use storage::repository::Storage;

    fn items() -> Vec<PracticeItem> {
        vec![PracticeItem::ReadAloud(
            ReadAloudItem::new("A short passage.", "daily life", vec![], vec![]).unwrap(),
        )]
    }

    async fn completed_session_id(svc: &PracticeService) -> SessionId {
        let session = svc
            .start_session(PracticeMode::ReadAloud, Difficulty::Beginner, items())
            .await
            .unwrap();
        svc.record_attempt(
            session.id(),
            0,
            "a short passage".into(),
            AxisScores::new(Some(90.0), Some(80.0), Some(100.0), Some(70.0), None).unwrap(),
            vec![],
        )
        .await
        .unwrap();
        svc.complete_session(session.id()).await.unwrap();
        session.id()
    }

    #[tokio::test]
    async fn overview_carries_summary_fields_only_when_completed() {
        let storage = Storage::in_memory();
        let svc = PracticeService::new(
            fixed_clock(),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.attempts),
        );
        let history = PracticeHistoryService::new(Arc::clone(&storage.sessions));

        let active = svc
            .start_session(PracticeMode::ReadAloud, Difficulty::Beginner, items())
            .await
            .unwrap();
        let completed = completed_session_id(&svc).await;

        let listed = history.list_recent(10).await.unwrap();
        assert_eq!(listed.len(), 2);

        let active_item = listed.iter().find(|o| o.id == active.id()).unwrap();
        assert_eq!(active_item.status, SessionStatus::Active);
        assert_eq!(active_item.total_attempts, None);
        assert_eq!(active_item.overall_avg, None);

        let completed_item = listed.iter().find(|o| o.id == completed).unwrap();
        assert_eq!(completed_item.status, SessionStatus::Completed);
        assert_eq!(completed_item.total_attempts, Some(1));
        assert_eq!(completed_item.overall_avg, Some(85.0));
    }

    #[tokio::test]
    async fn get_summary_requires_a_completed_session() {
        let storage = Storage::in_memory();
        let svc = PracticeService::new(
            fixed_clock(),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.attempts),
        );
        let history = PracticeHistoryService::new(Arc::clone(&storage.sessions));

        let active = svc
            .start_session(PracticeMode::ReadAloud, Difficulty::Beginner, items())
            .await
            .unwrap();
        let err = history.get_summary(active.id()).await.unwrap_err();
        assert!(matches!(
            err,
            PracticeError::InvalidState {
                status: SessionStatus::Active
            }
        ));

        let completed = completed_session_id(&svc).await;
        let summary = history.get_summary(completed).await.unwrap();
        assert_eq!(summary.total_attempts(), 1);

        let err = history.get_summary(SessionId::new(404)).await.unwrap_err();
        assert!(matches!(err, PracticeError::NotFound));
    }
}
