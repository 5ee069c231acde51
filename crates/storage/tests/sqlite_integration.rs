use chrono::Duration;
use speak_core::model::{
    AxisScores, Difficulty, ItemScore, PhonemeScore, PracticeItem, PracticeMode, ReadAloudItem,
    SessionId, SessionStatus, SessionSummary, WordErrorKind, WordResult,
};
use speak_core::time::fixed_now;
use storage::repository::{
    AttemptRepository, NewAttemptRecord, NewSessionRecord, SessionRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn session_record() -> NewSessionRecord {
    NewSessionRecord {
        mode: PracticeMode::ReadAloud,
        difficulty: Difficulty::Intermediate,
        items: vec![
            PracticeItem::ReadAloud(
                ReadAloudItem::new(
                    "The weather this morning is cold.",
                    "weather",
                    vec!["ð".into(), "θ".into()],
                    vec!["keep your tongue between your teeth for th".into()],
                )
                .unwrap(),
            ),
            PracticeItem::ReadAloud(
                ReadAloudItem::new("Thirty birds sat on a wire.", "animals", vec![], vec![])
                    .unwrap(),
            ),
        ],
        created_at: fixed_now(),
    }
}

fn attempt_record(session_id: SessionId, item_index: u32, offset_secs: i64) -> NewAttemptRecord {
    NewAttemptRecord {
        session_id,
        item_index,
        transcript: "the weather this morning is cold".into(),
        scores: AxisScores::new(Some(82.0), Some(74.0), Some(100.0), None, None).unwrap(),
        words: vec![
            WordResult::new(
                "weather",
                true,
                85.0,
                WordErrorKind::None,
                vec![PhonemeScore::new("ð", 60.0).unwrap()],
            )
            .unwrap(),
            WordResult::new("cold", false, 55.0, WordErrorKind::Mispronunciation, vec![])
                .unwrap(),
        ],
        created_at: fixed_now() + Duration::seconds(offset_secs),
    }
}

fn build_summary() -> SessionSummary {
    SessionSummary::new(
        82.0,
        74.0,
        100.0,
        0.0,
        85.3,
        85.3,
        85.3,
        1,
        vec!["cold".into()],
        vec![],
        vec![ItemScore {
            item_index: 0,
            best_score: 85.3,
            attempts: 1,
        }],
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_round_trips_sessions_and_attempts() {
    let repo = connect("memdb_roundtrip").await;

    let id = repo.create_session(session_record()).await.unwrap();
    let session = repo.get_session(id).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.item_count(), 2);
    assert_eq!(session.items()[0].mode(), PracticeMode::ReadAloud);
    assert!(session.summary().is_none());

    let first = repo.record_attempt(attempt_record(id, 0, 0)).await.unwrap();
    let second = repo.record_attempt(attempt_record(id, 0, 10)).await.unwrap();
    let third = repo.record_attempt(attempt_record(id, 1, 5)).await.unwrap();

    assert_eq!(first.ordinal(), 1);
    assert_eq!(second.ordinal(), 2);
    assert_eq!(third.ordinal(), 1);

    let attempts = repo.attempts_for_session(id).await.unwrap();
    assert_eq!(attempts.len(), 3);
    // ordered by item index, then creation time
    assert_eq!(attempts[0].item_index(), 0);
    assert_eq!(attempts[1].item_index(), 0);
    assert_eq!(attempts[2].item_index(), 1);
    assert_eq!(attempts[0].words().len(), 2);
    assert_eq!(attempts[0].words()[0].phonemes[0].phoneme, "ð");
    assert_eq!(attempts[0].scores().prosody, None);
}

#[tokio::test]
async fn sqlite_finalize_persists_summary_and_guards_status() {
    let repo = connect("memdb_finalize").await;

    let id = repo.create_session(session_record()).await.unwrap();
    repo.record_attempt(attempt_record(id, 0, 0)).await.unwrap();

    repo.finalize_session(id, &build_summary(), fixed_now())
        .await
        .unwrap();

    let session = repo.get_session(id).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(session.completed_at(), Some(fixed_now()));
    let summary = session.summary().expect("summary present after completion");
    assert_eq!(summary.total_attempts(), 1);
    assert_eq!(summary.weak_words(), &["cold".to_string()]);

    // the first summary stays; a second completion is rejected
    let err = repo
        .finalize_session(id, &build_summary(), fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let err = repo.record_attempt(attempt_record(id, 0, 20)).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_abandon_guards_and_rejects_attempts() {
    let repo = connect("memdb_abandon").await;

    let id = repo.create_session(session_record()).await.unwrap();
    repo.abandon_session(id).await.unwrap();

    let session = repo.get_session(id).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Abandoned);
    assert!(session.summary().is_none());
    assert_eq!(session.completed_at(), None);

    let err = repo.abandon_session(id).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let err = repo.record_attempt(attempt_record(id, 0, 0)).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_soft_delete_hides_rows_and_is_idempotent() {
    let repo = connect("memdb_delete").await;

    let id = repo.create_session(session_record()).await.unwrap();
    let keep = repo.create_session(session_record()).await.unwrap();

    repo.delete_session(id, fixed_now()).await.unwrap();

    let err = repo.get_session(id).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let listed = repo.list_sessions(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id(), keep);

    // repeat delete is a no-op
    repo.delete_session(id, fixed_now() + Duration::hours(1))
        .await
        .unwrap();

    // unknown ids still error
    let err = repo
        .delete_session(SessionId::new(9999), fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_unknown_session_reads_are_not_found() {
    let repo = connect("memdb_missing").await;

    let err = repo.get_session(SessionId::new(1)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let err = repo
        .record_attempt(attempt_record(SessionId::new(1), 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let attempts = repo.attempts_for_session(SessionId::new(1)).await.unwrap();
    assert!(attempts.is_empty());
}
