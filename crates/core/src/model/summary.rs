use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SummaryError {
    #[error("summary covers zero attempts")]
    NoAttempts,

    #[error("{field} value {value} is outside 0..=100")]
    ScoreOutOfRange { field: &'static str, value: f64 },
}

fn check_score(field: &'static str, value: f64) -> Result<(), SummaryError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(SummaryError::ScoreOutOfRange { field, value })
    }
}

//
// ─── SUMMARY PARTS ────────────────────────────────────────────────────────────
//

/// A phoneme the learner under-performs on, with context for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakPhoneme {
    pub phoneme: String,
    pub score: f64,
    pub occurrences: u32,
    pub example_words: Vec<String>,
}

/// Best-score and attempt-count rollup for one practice item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemScore {
    pub item_index: u32,
    pub best_score: f64,
    pub attempts: u32,
}

//
// ─── SESSION SUMMARY ──────────────────────────────────────────────────────────
//

/// Rollup of a completed pronunciation session.
///
/// Computed once at completion from all of the session's attempts and never
/// recomputed afterwards. Persisted as a JSON column embedded in the session
/// row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    accuracy_avg: f64,
    fluency_avg: f64,
    completeness_avg: f64,
    prosody_avg: f64,
    overall_avg: f64,
    best_score: f64,
    worst_score: f64,
    total_attempts: u32,
    weak_words: Vec<String>,
    weak_phonemes: Vec<WeakPhoneme>,
    item_scores: Vec<ItemScore>,
}

impl SessionSummary {
    /// Assemble a summary from computed rollup values.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::NoAttempts` for a zero attempt count, or
    /// `SummaryError::ScoreOutOfRange` if any value falls outside 0..=100.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accuracy_avg: f64,
        fluency_avg: f64,
        completeness_avg: f64,
        prosody_avg: f64,
        overall_avg: f64,
        best_score: f64,
        worst_score: f64,
        total_attempts: u32,
        weak_words: Vec<String>,
        weak_phonemes: Vec<WeakPhoneme>,
        item_scores: Vec<ItemScore>,
    ) -> Result<Self, SummaryError> {
        let summary = Self {
            accuracy_avg,
            fluency_avg,
            completeness_avg,
            prosody_avg,
            overall_avg,
            best_score,
            worst_score,
            total_attempts,
            weak_words,
            weak_phonemes,
            item_scores,
        };
        summary.validate()?;
        Ok(summary)
    }

    /// Re-check invariants after deserializing from storage.
    ///
    /// # Errors
    ///
    /// Same conditions as [`SessionSummary::new`].
    pub fn validate(&self) -> Result<(), SummaryError> {
        if self.total_attempts == 0 {
            return Err(SummaryError::NoAttempts);
        }
        check_score("accuracy_avg", self.accuracy_avg)?;
        check_score("fluency_avg", self.fluency_avg)?;
        check_score("completeness_avg", self.completeness_avg)?;
        check_score("prosody_avg", self.prosody_avg)?;
        check_score("overall_avg", self.overall_avg)?;
        check_score("best_score", self.best_score)?;
        check_score("worst_score", self.worst_score)?;
        for weak in &self.weak_phonemes {
            check_score("weak phoneme", weak.score)?;
        }
        for item in &self.item_scores {
            check_score("item best_score", item.best_score)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn accuracy_avg(&self) -> f64 {
        self.accuracy_avg
    }

    #[must_use]
    pub fn fluency_avg(&self) -> f64 {
        self.fluency_avg
    }

    #[must_use]
    pub fn completeness_avg(&self) -> f64 {
        self.completeness_avg
    }

    #[must_use]
    pub fn prosody_avg(&self) -> f64 {
        self.prosody_avg
    }

    #[must_use]
    pub fn overall_avg(&self) -> f64 {
        self.overall_avg
    }

    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    #[must_use]
    pub fn worst_score(&self) -> f64 {
        self.worst_score
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    /// Weak words ranked ascending by mean accuracy, capped.
    #[must_use]
    pub fn weak_words(&self) -> &[String] {
        &self.weak_words
    }

    /// Weak phonemes ranked ascending by mean score, capped.
    #[must_use]
    pub fn weak_phonemes(&self) -> &[WeakPhoneme] {
        &self.weak_phonemes
    }

    /// Per-item stats ordered by item index.
    #[must_use]
    pub fn item_scores(&self) -> &[ItemScore] {
        &self.item_scores
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn build_summary(total_attempts: u32, best: f64) -> Result<SessionSummary, SummaryError> {
        SessionSummary::new(
            80.0,
            75.0,
            90.0,
            70.0,
            78.75,
            best,
            60.0,
            total_attempts,
            vec!["the".into()],
            vec![WeakPhoneme {
                phoneme: "ð".into(),
                score: 55.0,
                occurrences: 3,
                example_words: vec!["the".into(), "weather".into()],
            }],
            vec![ItemScore {
                item_index: 0,
                best_score: best,
                attempts: total_attempts,
            }],
        )
    }

    #[test]
    fn summary_rejects_zero_attempts() {
        let err = build_summary(0, 90.0).unwrap_err();
        assert_eq!(err, SummaryError::NoAttempts);
    }

    #[test]
    fn summary_rejects_out_of_range_scores() {
        let err = build_summary(3, 120.0).unwrap_err();
        assert!(matches!(err, SummaryError::ScoreOutOfRange { .. }));
    }

    #[test]
    fn summary_round_trips_through_json() {
        let summary = build_summary(3, 90.0).unwrap();
        let encoded = serde_json::to_string(&summary).unwrap();
        let decoded: SessionSummary = serde_json::from_str(&encoded).unwrap();
        decoded.validate().unwrap();
        assert_eq!(decoded, summary);
        assert_eq!(decoded.weak_words(), &["the".to_string()]);
        assert_eq!(decoded.weak_phonemes()[0].occurrences, 3);
    }
}
