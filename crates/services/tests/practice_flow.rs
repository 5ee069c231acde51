use std::sync::Arc;

use speak_core::model::{
    AxisScores, Difficulty, PhonemeScore, PracticeItem, PracticeMode, ReadAloudItem,
    SessionStatus, WordErrorKind, WordResult,
};
use speak_core::time::fixed_clock;
use services::{PracticeHistoryService, PracticeService};
use storage::repository::Storage;

fn word(text: &str, accuracy: f64, phonemes: Vec<PhonemeScore>) -> WordResult {
    WordResult::new(text, accuracy >= 70.0, accuracy, WordErrorKind::None, phonemes).unwrap()
}

fn axis(overall: f64) -> AxisScores {
    AxisScores::new(Some(overall), Some(overall), Some(overall), Some(overall), None).unwrap()
}

#[tokio::test]
async fn practice_flow_completes_with_summary() {
    let storage = Storage::in_memory();
    let svc = PracticeService::new(
        fixed_clock(),
        Arc::clone(&storage.sessions),
        Arc::clone(&storage.attempts),
    );
    let history = PracticeHistoryService::new(Arc::clone(&storage.sessions));

    let items = vec![
        PracticeItem::ReadAloud(
            ReadAloudItem::new(
                "The weather this morning is cold.",
                "weather",
                vec!["ð".into()],
                vec!["voice the th in weather".into()],
            )
            .unwrap(),
        ),
        PracticeItem::ReadAloud(
            ReadAloudItem::new("Thirty birds sat on a wire.", "animals", vec![], vec![]).unwrap(),
        ),
    ];

    let session = svc
        .start_session(PracticeMode::ReadAloud, Difficulty::Intermediate, items)
        .await
        .unwrap();
    assert_eq!(session.status(), SessionStatus::Active);
    assert!(session.summary().is_none());

    // item 0: two tries, item 1: one try
    svc.record_attempt(
        session.id(),
        0,
        "the weather this morning is cold".into(),
        axis(80.0),
        vec![
            word("the", 50.0, vec![PhonemeScore::new("ð", 45.0).unwrap()]),
            word("weather", 85.0, vec![PhonemeScore::new("ð", 55.0).unwrap()]),
        ],
    )
    .await
    .unwrap();
    svc.record_attempt(
        session.id(),
        0,
        "the weather this morning is cold".into(),
        axis(90.0),
        vec![
            word("the", 60.0, vec![PhonemeScore::new("ð", 58.0).unwrap()]),
            word("weather", 92.0, vec![]),
        ],
    )
    .await
    .unwrap();
    svc.record_attempt(
        session.id(),
        1,
        "thirty birds sat on a wire".into(),
        axis(60.0),
        vec![word("the", 55.0, vec![])],
    )
    .await
    .unwrap();

    let summary = svc.complete_session(session.id()).await.unwrap();

    assert_eq!(summary.total_attempts(), 3);
    assert_eq!(summary.best_score(), 90.0);
    assert_eq!(summary.worst_score(), 60.0);

    let item_scores = summary.item_scores();
    assert_eq!(item_scores.len(), 2);
    assert_eq!(item_scores[0].item_index, 0);
    assert_eq!(item_scores[0].best_score, 90.0);
    assert_eq!(item_scores[0].attempts, 2);
    assert_eq!(item_scores[1].item_index, 1);
    assert_eq!(item_scores[1].best_score, 60.0);
    assert_eq!(item_scores[1].attempts, 1);

    // "the" averaged (50 + 60 + 55) / 3 = 55, well under the 70 threshold
    assert!(summary.weak_words().contains(&"the".to_string()));
    assert!(!summary.weak_words().contains(&"weather".to_string()));

    let weak_dh = summary
        .weak_phonemes()
        .iter()
        .find(|p| p.phoneme == "ð")
        .expect("ð flagged as weak");
    assert_eq!(weak_dh.occurrences, 3);
    assert_eq!(weak_dh.example_words, vec!["the".to_string(), "weather".to_string()]);

    // the summary is visible on re-read and through the history facade
    let reread = svc.get_session(session.id()).await.unwrap();
    assert_eq!(reread.status(), SessionStatus::Completed);
    assert_eq!(reread.summary(), Some(&summary));
    assert_eq!(
        history.get_summary(session.id()).await.unwrap(),
        summary
    );

    // soft delete hides the session everywhere
    svc.delete_session(session.id()).await.unwrap();
    assert!(history.list_recent(10).await.unwrap().is_empty());
}
