use chrono::{DateTime, Utc};
use speak_core::model::{Session, SessionId, SessionSummary};

use super::{
    SqliteRepository,
    mapping::{id_i64, items_to_json, map_session_row, ser, session_id_from_i64, summary_to_json},
};
use crate::repository::{NewSessionRecord, SessionRepository, StorageError};

impl SqliteRepository {
    async fn session_row_exists(&self, id: SessionId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE id = ?1")
            .bind(id_i64("session_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Distinguish a failed guarded update: the row is either gone/deleted
    /// (`NotFound`) or no longer active (`Conflict`).
    async fn classify_guard_miss(&self, id: SessionId) -> StorageError {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE id = ?1 AND deleted_at IS NULL")
            .bind(match id_i64("session_id", id.value()) {
                Ok(v) => v,
                Err(e) => return e,
            })
            .fetch_optional(&self.pool)
            .await;
        match row {
            Ok(Some(_)) => StorageError::Conflict,
            Ok(None) => StorageError::NotFound,
            Err(e) => StorageError::Connection(e.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, record: NewSessionRecord) -> Result<SessionId, StorageError> {
        let items = items_to_json(&record.items)?;

        let res = sqlx::query(
            r"
                INSERT INTO sessions (mode, difficulty, items, status, created_at)
                VALUES (?1, ?2, ?3, 'active', ?4)
            ",
        )
        .bind(record.mode.as_str())
        .bind(record.difficulty.as_str())
        .bind(items)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        session_id_from_i64(res.last_insert_rowid())
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, mode, difficulty, items, status, summary,
                    created_at, completed_at, deleted_at
                FROM sessions
                WHERE id = ?1 AND deleted_at IS NULL
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn list_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, mode, difficulty, items, status, summary,
                    created_at, completed_at, deleted_at
                FROM sessions
                WHERE deleted_at IS NULL
                ORDER BY created_at DESC, id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }

    async fn finalize_session(
        &self,
        id: SessionId,
        summary: &SessionSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        summary.validate().map_err(ser)?;
        let encoded = summary_to_json(summary)?;

        let res = sqlx::query(
            r"
                UPDATE sessions
                SET status = 'completed', summary = ?2, completed_at = ?3
                WHERE id = ?1 AND status = 'active' AND deleted_at IS NULL
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .bind(encoded)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(self.classify_guard_miss(id).await);
        }
        Ok(())
    }

    async fn abandon_session(&self, id: SessionId) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE sessions
                SET status = 'abandoned'
                WHERE id = ?1 AND status = 'active' AND deleted_at IS NULL
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(self.classify_guard_miss(id).await);
        }
        Ok(())
    }

    async fn delete_session(&self, id: SessionId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE sessions
                SET deleted_at = ?2
                WHERE id = ?1 AND deleted_at IS NULL
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 && !self.session_row_exists(id).await? {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
