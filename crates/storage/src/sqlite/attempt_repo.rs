use sqlx::Row;
use speak_core::model::{Attempt, SessionId};

use super::{
    SqliteRepository,
    mapping::{attempt_id_from_i64, id_i64, map_attempt_row, ser, u32_from_i64, words_to_json},
};
use crate::repository::{AttemptRepository, NewAttemptRecord, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn record_attempt(&self, record: NewAttemptRecord) -> Result<Attempt, StorageError> {
        record.scores.validate().map_err(ser)?;
        let words = words_to_json(&record.words)?;
        let session_id = id_i64("session_id", record.session_id.value())?;
        let item_index = i64::from(record.item_index);

        // The status check, ordinal assignment, and insert share one
        // transaction so completion cannot interleave with an append.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let session = sqlx::query(
            r"
                SELECT status FROM sessions
                WHERE id = ?1 AND deleted_at IS NULL
            ",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let status: String = session.try_get("status").map_err(ser)?;
        if status != "active" {
            return Err(StorageError::Conflict);
        }

        let count_row = sqlx::query(
            r"
                SELECT COUNT(*) AS n FROM attempts
                WHERE session_id = ?1 AND item_index = ?2
            ",
        )
        .bind(session_id)
        .bind(item_index)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        let existing: i64 = count_row.try_get("n").map_err(ser)?;
        let ordinal = u32_from_i64("ordinal", existing + 1)?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    session_id, item_index, ordinal, transcript,
                    accuracy, fluency, completeness, prosody, overall,
                    words, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(session_id)
        .bind(item_index)
        .bind(i64::from(ordinal))
        .bind(&record.transcript)
        .bind(record.scores.accuracy)
        .bind(record.scores.fluency)
        .bind(record.scores.completeness)
        .bind(record.scores.prosody)
        .bind(record.scores.overall)
        .bind(words)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Attempt::from_persisted(
            attempt_id_from_i64(res.last_insert_rowid())?,
            record.session_id,
            record.item_index,
            ordinal,
            record.transcript,
            record.scores,
            record.words,
            record.created_at,
        )
        .map_err(ser)
    }

    async fn attempts_for_session(&self, id: SessionId) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, session_id, item_index, ordinal, transcript,
                    accuracy, fluency, completeness, prosody, overall,
                    words, created_at
                FROM attempts
                WHERE session_id = ?1
                ORDER BY item_index ASC, created_at ASC, id ASC
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }
}
