use speak_core::model::{
    Attempt, AttemptId, AxisScores, Difficulty, PracticeItem, PracticeMode, Session, SessionId,
    SessionStatus, SessionSummary, WordResult,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

//
// ─── ENUM ENCODING ────────────────────────────────────────────────────────────
//

pub(crate) fn parse_mode(s: &str) -> Result<PracticeMode, StorageError> {
    match s {
        "read-aloud" => Ok(PracticeMode::ReadAloud),
        "tongue-twisters" => Ok(PracticeMode::TongueTwisters),
        _ => Err(StorageError::Serialization(format!("invalid mode: {s}"))),
    }
}

pub(crate) fn parse_difficulty(s: &str) -> Result<Difficulty, StorageError> {
    match s {
        "beginner" => Ok(Difficulty::Beginner),
        "intermediate" => Ok(Difficulty::Intermediate),
        "advanced" => Ok(Difficulty::Advanced),
        _ => Err(StorageError::Serialization(format!(
            "invalid difficulty: {s}"
        ))),
    }
}

pub(crate) fn parse_status(s: &str) -> Result<SessionStatus, StorageError> {
    match s {
        "active" => Ok(SessionStatus::Active),
        "completed" => Ok(SessionStatus::Completed),
        "abandoned" => Ok(SessionStatus::Abandoned),
        _ => Err(StorageError::Serialization(format!("invalid status: {s}"))),
    }
}

//
// ─── JSON COLUMNS ─────────────────────────────────────────────────────────────
//

pub(crate) fn items_to_json(items: &[PracticeItem]) -> Result<String, StorageError> {
    serde_json::to_string(items).map_err(ser)
}

pub(crate) fn items_from_json(raw: &str) -> Result<Vec<PracticeItem>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn words_to_json(words: &[WordResult]) -> Result<String, StorageError> {
    serde_json::to_string(words).map_err(ser)
}

pub(crate) fn words_from_json(raw: &str) -> Result<Vec<WordResult>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn summary_to_json(summary: &SessionSummary) -> Result<String, StorageError> {
    serde_json::to_string(summary).map_err(ser)
}

pub(crate) fn summary_from_json(raw: &str) -> Result<SessionSummary, StorageError> {
    let summary: SessionSummary = serde_json::from_str(raw).map_err(ser)?;
    // serde bypasses the validating constructor, so re-check invariants here.
    summary.validate().map_err(ser)?;
    Ok(summary)
}

//
// ─── ROW MAPPING ──────────────────────────────────────────────────────────────
//

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StorageError> {
    let id = session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;

    let mode_str: String = row.try_get("mode").map_err(ser)?;
    let difficulty_str: String = row.try_get("difficulty").map_err(ser)?;
    let status_str: String = row.try_get("status").map_err(ser)?;

    let items_raw: String = row.try_get("items").map_err(ser)?;
    let summary = row
        .try_get::<Option<String>, _>("summary")
        .map_err(ser)?
        .map(|raw| summary_from_json(&raw))
        .transpose()?;

    Session::from_persisted(
        id,
        parse_mode(&mode_str)?,
        parse_difficulty(&difficulty_str)?,
        items_from_json(&items_raw)?,
        parse_status(&status_str)?,
        summary,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        row.try_get("deleted_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let id = attempt_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let session_id = session_id_from_i64(row.try_get::<i64, _>("session_id").map_err(ser)?)?;
    let item_index = u32_from_i64("item_index", row.try_get::<i64, _>("item_index").map_err(ser)?)?;
    let ordinal = u32_from_i64("ordinal", row.try_get::<i64, _>("ordinal").map_err(ser)?)?;

    let scores = AxisScores::new(
        row.try_get("accuracy").map_err(ser)?,
        row.try_get("fluency").map_err(ser)?,
        row.try_get("completeness").map_err(ser)?,
        row.try_get("prosody").map_err(ser)?,
        row.try_get("overall").map_err(ser)?,
    )
    .map_err(ser)?;

    let words_raw: String = row.try_get("words").map_err(ser)?;

    Attempt::from_persisted(
        id,
        session_id,
        item_index,
        ordinal,
        row.try_get("transcript").map_err(ser)?,
        scores,
        words_from_json(&words_raw)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}
