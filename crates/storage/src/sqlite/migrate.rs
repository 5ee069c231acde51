use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema: sessions with embedded JSON item/summary columns,
/// append-only attempts with JSON word results, and the supporting indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY,
                    mode TEXT NOT NULL CHECK (mode IN ('read-aloud', 'tongue-twisters')),
                    difficulty TEXT NOT NULL
                        CHECK (difficulty IN ('beginner', 'intermediate', 'advanced')),
                    items TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'active'
                        CHECK (status IN ('active', 'completed', 'abandoned')),
                    summary TEXT,
                    created_at TEXT NOT NULL,
                    completed_at TEXT,
                    deleted_at TEXT,
                    CHECK ((status = 'completed') = (summary IS NOT NULL)),
                    CHECK ((status = 'completed') = (completed_at IS NOT NULL))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS attempts (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL,
                    item_index INTEGER NOT NULL CHECK (item_index >= 0),
                    ordinal INTEGER NOT NULL CHECK (ordinal >= 1),
                    transcript TEXT NOT NULL,
                    accuracy REAL CHECK (accuracy BETWEEN 0 AND 100),
                    fluency REAL CHECK (fluency BETWEEN 0 AND 100),
                    completeness REAL CHECK (completeness BETWEEN 0 AND 100),
                    prosody REAL CHECK (prosody BETWEEN 0 AND 100),
                    overall REAL CHECK (overall BETWEEN 0 AND 100),
                    words TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (session_id, item_index, ordinal),
                    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_deleted_created
                    ON sessions (deleted_at, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attempts_session_item_created
                    ON attempts (session_id, item_index, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
