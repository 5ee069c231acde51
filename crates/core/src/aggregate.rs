//! Folds a session's attempts into a [`SessionSummary`].
//!
//! The fold is pure and deterministic over the attempt slice: callers pass
//! attempts in storage order (item index, then creation time), and that order
//! decides first-seen tie-breaking for weak words and phonemes.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{Attempt, AttemptError, ItemScore, SessionSummary, SummaryError, WeakPhoneme};

//
// ─── CONFIG ───────────────────────────────────────────────────────────────────
//

/// Tunable knobs for weak-point detection.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateConfig {
    /// Mean score below which a word or phoneme counts as weak.
    pub weak_score_threshold: f64,
    /// Maximum number of weak words reported.
    pub weak_word_cap: usize,
    /// Maximum number of weak phonemes reported.
    pub weak_phoneme_cap: usize,
    /// Maximum example words listed per weak phoneme.
    pub example_word_cap: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            weak_score_threshold: 70.0,
            weak_word_cap: 10,
            weak_phoneme_cap: 10,
            example_word_cap: 5,
        }
    }
}

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AggregateError {
    #[error("cannot summarize a session with no attempts")]
    NoAttempts,

    #[error("too many attempts for a single session: {len}")]
    TooManyAttempts { len: usize },

    #[error("attempt for item {item_index} violates score invariants: {source}")]
    InvalidAttempt {
        item_index: u32,
        #[source]
        source: AttemptError,
    },

    #[error(transparent)]
    Summary(#[from] SummaryError),
}

//
// ─── ACCUMULATORS ─────────────────────────────────────────────────────────────
//

struct MeanAcc {
    sum: f64,
    count: u32,
}

impl MeanAcc {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Mean of accumulated values, or 0 when nothing was accumulated.
    fn mean_or_zero(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / f64::from(self.count)
        }
    }
}

struct WordStat {
    display: String,
    acc: MeanAcc,
}

struct PhonemeStat {
    symbol: String,
    acc: MeanAcc,
    example_words: Vec<String>,
    example_keys: Vec<String>,
}

//
// ─── SUMMARIZE ────────────────────────────────────────────────────────────────
//

/// Fold a session's attempts into a fully populated summary.
///
/// # Errors
///
/// Returns `AggregateError::NoAttempts` for an empty slice, or
/// `AggregateError::InvalidAttempt` when attempt data violates the 0..=100
/// score invariant. Malformed data is rejected rather than clamped so that
/// upstream assessment bugs stay visible.
pub fn summarize(
    attempts: &[Attempt],
    config: &AggregateConfig,
) -> Result<SessionSummary, AggregateError> {
    if attempts.is_empty() {
        return Err(AggregateError::NoAttempts);
    }

    for attempt in attempts {
        verify_attempt(attempt)?;
    }

    let mut accuracy = MeanAcc::new();
    let mut fluency = MeanAcc::new();
    let mut completeness = MeanAcc::new();
    let mut prosody = MeanAcc::new();
    let mut overall = MeanAcc::new();

    let mut best_score = f64::MIN;
    let mut worst_score = f64::MAX;

    // item_index → (best overall, attempt count), ordered by first appearance
    // then sorted by index before assembly.
    let mut item_stats: Vec<(u32, f64, u32)> = Vec::new();
    let mut item_slots: HashMap<u32, usize> = HashMap::new();

    let mut word_stats: Vec<WordStat> = Vec::new();
    let mut word_slots: HashMap<String, usize> = HashMap::new();

    let mut phoneme_stats: Vec<PhonemeStat> = Vec::new();
    let mut phoneme_slots: HashMap<String, usize> = HashMap::new();

    for attempt in attempts {
        let scores = attempt.scores();
        if let Some(v) = scores.accuracy {
            accuracy.push(v);
        }
        if let Some(v) = scores.fluency {
            fluency.push(v);
        }
        if let Some(v) = scores.completeness {
            completeness.push(v);
        }
        if let Some(v) = scores.prosody {
            prosody.push(v);
        }

        let attempt_overall = attempt.overall_score();
        overall.push(attempt_overall);
        best_score = best_score.max(attempt_overall);
        worst_score = worst_score.min(attempt_overall);

        let slot = *item_slots.entry(attempt.item_index()).or_insert_with(|| {
            item_stats.push((attempt.item_index(), f64::MIN, 0));
            item_stats.len() - 1
        });
        let (_, item_best, item_count) = &mut item_stats[slot];
        *item_best = item_best.max(attempt_overall);
        *item_count += 1;

        for word in attempt.words() {
            let key = word.word.to_lowercase();
            let slot = *word_slots.entry(key).or_insert_with(|| {
                word_stats.push(WordStat {
                    display: word.word.clone(),
                    acc: MeanAcc::new(),
                });
                word_stats.len() - 1
            });
            word_stats[slot].acc.push(word.accuracy);

            for phoneme in &word.phonemes {
                let slot = *phoneme_slots
                    .entry(phoneme.phoneme.clone())
                    .or_insert_with(|| {
                        phoneme_stats.push(PhonemeStat {
                            symbol: phoneme.phoneme.clone(),
                            acc: MeanAcc::new(),
                            example_words: Vec::new(),
                            example_keys: Vec::new(),
                        });
                        phoneme_stats.len() - 1
                    });
                let stat = &mut phoneme_stats[slot];
                stat.acc.push(phoneme.score);

                let word_key = word.word.to_lowercase();
                if stat.example_words.len() < config.example_word_cap
                    && !stat.example_keys.contains(&word_key)
                {
                    stat.example_keys.push(word_key);
                    stat.example_words.push(word.word.clone());
                }
            }
        }
    }

    let mut item_scores: Vec<ItemScore> = item_stats
        .into_iter()
        .map(|(item_index, best, attempts)| ItemScore {
            item_index,
            best_score: best,
            attempts,
        })
        .collect();
    item_scores.sort_by_key(|item| item.item_index);

    // Stable sorts below keep first-seen order for equal means.
    let mut weak_words: Vec<(f64, String)> = word_stats
        .into_iter()
        .filter_map(|stat| {
            let mean = stat.acc.mean_or_zero();
            (mean < config.weak_score_threshold).then_some((mean, stat.display))
        })
        .collect();
    weak_words.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    weak_words.truncate(config.weak_word_cap);

    let mut weak_phonemes: Vec<WeakPhoneme> = phoneme_stats
        .into_iter()
        .filter_map(|stat| {
            let mean = stat.acc.mean_or_zero();
            (mean < config.weak_score_threshold).then_some(WeakPhoneme {
                phoneme: stat.symbol,
                score: mean,
                occurrences: stat.acc.count,
                example_words: stat.example_words,
            })
        })
        .collect();
    weak_phonemes.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    weak_phonemes.truncate(config.weak_phoneme_cap);

    let total_attempts = u32::try_from(attempts.len())
        .map_err(|_| AggregateError::TooManyAttempts {
            len: attempts.len(),
        })?;

    Ok(SessionSummary::new(
        accuracy.mean_or_zero(),
        fluency.mean_or_zero(),
        completeness.mean_or_zero(),
        prosody.mean_or_zero(),
        overall.mean_or_zero(),
        best_score,
        worst_score,
        total_attempts,
        weak_words.into_iter().map(|(_, word)| word).collect(),
        weak_phonemes,
        item_scores,
    )?)
}

fn verify_attempt(attempt: &Attempt) -> Result<(), AggregateError> {
    let invalid = |source| AggregateError::InvalidAttempt {
        item_index: attempt.item_index(),
        source,
    };
    attempt.scores().validate().map_err(invalid)?;
    for word in attempt.words() {
        word.validate().map_err(|source| AggregateError::InvalidAttempt {
            item_index: attempt.item_index(),
            source,
        })?;
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AxisScores, PhonemeScore, SessionId, WordErrorKind, WordResult,
    };
    use crate::time::fixed_now;

    fn attempt_with_overall(item_index: u32, ordinal: u32, overall: f64) -> Attempt {
        Attempt::new(
            SessionId::new(1),
            item_index,
            ordinal,
            "text",
            AxisScores::new(Some(overall), Some(overall), Some(overall), Some(overall), None)
                .unwrap(),
            vec![],
            fixed_now(),
        )
        .unwrap()
    }

    fn attempt_with_words(words: Vec<WordResult>) -> Attempt {
        Attempt::new(
            SessionId::new(1),
            0,
            1,
            "text",
            AxisScores::new(Some(80.0), Some(80.0), Some(80.0), Some(80.0), None).unwrap(),
            words,
            fixed_now(),
        )
        .unwrap()
    }

    fn word(text: &str, accuracy: f64, phonemes: Vec<PhonemeScore>) -> WordResult {
        WordResult::new(text, accuracy >= 70.0, accuracy, WordErrorKind::None, phonemes).unwrap()
    }

    #[test]
    fn empty_attempt_set_is_rejected() {
        let err = summarize(&[], &AggregateConfig::default()).unwrap_err();
        assert_eq!(err, AggregateError::NoAttempts);
    }

    #[test]
    fn per_item_stats_best_and_counts() {
        let attempts = vec![
            attempt_with_overall(0, 1, 80.0),
            attempt_with_overall(0, 2, 90.0),
            attempt_with_overall(1, 1, 60.0),
        ];

        let summary = summarize(&attempts, &AggregateConfig::default()).unwrap();

        assert_eq!(summary.total_attempts(), 3);
        assert_eq!(summary.best_score(), 90.0);
        assert_eq!(summary.worst_score(), 60.0);
        assert!((summary.overall_avg() - 230.0 / 3.0).abs() < 1e-9);

        let items = summary.item_scores();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_index, 0);
        assert_eq!(items[0].best_score, 90.0);
        assert_eq!(items[0].attempts, 2);
        assert_eq!(items[1].item_index, 1);
        assert_eq!(items[1].best_score, 60.0);
        assert_eq!(items[1].attempts, 1);
    }

    #[test]
    fn axis_means_skip_missing_values() {
        let a = Attempt::new(
            SessionId::new(1),
            0,
            1,
            "a",
            AxisScores::new(Some(80.0), Some(90.0), None, None, None).unwrap(),
            vec![],
            fixed_now(),
        )
        .unwrap();
        let b = Attempt::new(
            SessionId::new(1),
            0,
            2,
            "b",
            AxisScores::new(Some(60.0), None, None, None, None).unwrap(),
            vec![],
            fixed_now(),
        )
        .unwrap();

        let summary = summarize(&[a, b], &AggregateConfig::default()).unwrap();

        assert_eq!(summary.accuracy_avg(), 70.0);
        assert_eq!(summary.fluency_avg(), 90.0);
        // prosody was never measured, so its average is 0 rather than NaN
        assert_eq!(summary.prosody_avg(), 0.0);
        assert_eq!(summary.completeness_avg(), 0.0);
    }

    #[test]
    fn explicit_overall_wins_over_derived() {
        let explicit = Attempt::new(
            SessionId::new(1),
            0,
            1,
            "a",
            AxisScores::new(Some(40.0), Some(40.0), Some(40.0), Some(40.0), Some(95.0)).unwrap(),
            vec![],
            fixed_now(),
        )
        .unwrap();

        let summary = summarize(&[explicit], &AggregateConfig::default()).unwrap();
        assert_eq!(summary.best_score(), 95.0);
        assert_eq!(summary.overall_avg(), 95.0);
    }

    #[test]
    fn repeated_word_below_threshold_is_weak() {
        let attempts = vec![
            attempt_with_words(vec![word("The", 50.0, vec![]), word("sun", 95.0, vec![])]),
            attempt_with_words(vec![word("the", 60.0, vec![])]),
            attempt_with_words(vec![word("THE", 55.0, vec![])]),
        ];

        let summary = summarize(&attempts, &AggregateConfig::default()).unwrap();

        // grouped case-insensitively, reported with first-seen casing
        assert_eq!(summary.weak_words(), &["The".to_string()]);
    }

    #[test]
    fn weak_words_are_ranked_ascending_and_capped() {
        let words: Vec<WordResult> = (0..12)
            .map(|i| word(&format!("w{i}"), 69.0 - f64::from(i), vec![]))
            .collect();
        let summary = summarize(
            &[attempt_with_words(words)],
            &AggregateConfig::default(),
        )
        .unwrap();

        let weak = summary.weak_words();
        assert_eq!(weak.len(), 10);
        // worst word first
        assert_eq!(weak[0], "w11");
        assert_eq!(weak[9], "w2");
    }

    #[test]
    fn weak_phonemes_track_occurrences_and_examples() {
        let attempts = vec![
            attempt_with_words(vec![
                word("think", 60.0, vec![PhonemeScore::new("θ", 50.0).unwrap()]),
                word("Thin", 65.0, vec![PhonemeScore::new("θ", 60.0).unwrap()]),
            ]),
            attempt_with_words(vec![word(
                "think",
                62.0,
                vec![
                    PhonemeScore::new("θ", 55.0).unwrap(),
                    PhonemeScore::new("k", 98.0).unwrap(),
                ],
            )]),
        ];

        let summary = summarize(&attempts, &AggregateConfig::default()).unwrap();

        assert_eq!(summary.weak_phonemes().len(), 1);
        let weak = &summary.weak_phonemes()[0];
        assert_eq!(weak.phoneme, "θ");
        assert_eq!(weak.occurrences, 3);
        assert!((weak.score - 55.0).abs() < 1e-9);
        // distinct containing words in first-seen order
        assert_eq!(weak.example_words, vec!["think".to_string(), "Thin".to_string()]);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let words = vec![
            word("alpha", 50.0, vec![]),
            word("beta", 50.0, vec![]),
            word("gamma", 40.0, vec![]),
        ];
        let summary = summarize(
            &[attempt_with_words(words)],
            &AggregateConfig::default(),
        )
        .unwrap();

        assert_eq!(
            summary.weak_words(),
            &["gamma".to_string(), "alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn custom_config_threshold_and_caps_apply() {
        let words = vec![
            word("alpha", 75.0, vec![]),
            word("beta", 72.0, vec![]),
            word("gamma", 90.0, vec![]),
        ];
        let config = AggregateConfig {
            weak_score_threshold: 80.0,
            weak_word_cap: 1,
            ..AggregateConfig::default()
        };
        let summary = summarize(&[attempt_with_words(words)], &config).unwrap();

        assert_eq!(summary.weak_words(), &["beta".to_string()]);
    }
}
