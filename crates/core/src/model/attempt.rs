use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptId, SessionId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised while validating attempt data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttemptError {
    #[error("{field} score {value} is outside 0..=100")]
    ScoreOutOfRange { field: &'static str, value: f64 },
}

fn check_score(field: &'static str, value: f64) -> Result<(), AttemptError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(AttemptError::ScoreOutOfRange { field, value })
    }
}

fn check_opt_score(field: &'static str, value: Option<f64>) -> Result<(), AttemptError> {
    match value {
        Some(v) => check_score(field, v),
        None => Ok(()),
    }
}

//
// ─── WORD & PHONEME RESULTS ───────────────────────────────────────────────────
//

/// Error classification the assessment service assigns to a spoken word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordErrorKind {
    None,
    Omission,
    Insertion,
    Mispronunciation,
    UnexpectedBreak,
    MissingBreak,
    Monotone,
}

impl WordErrorKind {
    /// Storage representation of the classification.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WordErrorKind::None => "none",
            WordErrorKind::Omission => "omission",
            WordErrorKind::Insertion => "insertion",
            WordErrorKind::Mispronunciation => "mispronunciation",
            WordErrorKind::UnexpectedBreak => "unexpected-break",
            WordErrorKind::MissingBreak => "missing-break",
            WordErrorKind::Monotone => "monotone",
        }
    }
}

/// Score for a single phoneme within a spoken word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeScore {
    pub phoneme: String,
    pub score: f64,
}

impl PhonemeScore {
    /// Build a phoneme score.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreOutOfRange` if the score is not in 0..=100.
    pub fn new(phoneme: impl Into<String>, score: f64) -> Result<Self, AttemptError> {
        check_score("phoneme", score)?;
        Ok(Self {
            phoneme: phoneme.into(),
            score,
        })
    }
}

/// Per-word assessment within an attempt, in spoken order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordResult {
    pub word: String,
    pub correct: bool,
    pub accuracy: f64,
    pub error: WordErrorKind,
    pub phonemes: Vec<PhonemeScore>,
}

impl WordResult {
    /// Build a word result, validating the accuracy and every phoneme score.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreOutOfRange` for any score outside 0..=100.
    pub fn new(
        word: impl Into<String>,
        correct: bool,
        accuracy: f64,
        error: WordErrorKind,
        phonemes: Vec<PhonemeScore>,
    ) -> Result<Self, AttemptError> {
        let result = Self {
            word: word.into(),
            correct,
            accuracy,
            error,
            phonemes,
        };
        result.validate()?;
        Ok(result)
    }

    /// Re-check the accuracy and every phoneme score against 0..=100.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreOutOfRange` for the first violation found.
    pub fn validate(&self) -> Result<(), AttemptError> {
        check_score("word accuracy", self.accuracy)?;
        for phoneme in &self.phonemes {
            check_score("phoneme", phoneme.score)?;
        }
        Ok(())
    }
}

//
// ─── AXIS SCORES ──────────────────────────────────────────────────────────────
//

/// The per-attempt scores supplied by the assessment service.
///
/// Each axis is optional: the service may omit an axis it could not measure.
/// `overall` is an explicitly supplied overall score; when absent the overall
/// is derived from the present axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisScores {
    pub accuracy: Option<f64>,
    pub fluency: Option<f64>,
    pub completeness: Option<f64>,
    pub prosody: Option<f64>,
    pub overall: Option<f64>,
}

impl AxisScores {
    /// Build axis scores, validating every present value.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreOutOfRange` for any value outside 0..=100.
    pub fn new(
        accuracy: Option<f64>,
        fluency: Option<f64>,
        completeness: Option<f64>,
        prosody: Option<f64>,
        overall: Option<f64>,
    ) -> Result<Self, AttemptError> {
        let scores = Self {
            accuracy,
            fluency,
            completeness,
            prosody,
            overall,
        };
        scores.validate()?;
        Ok(scores)
    }

    /// Re-check every present value against the 0..=100 range.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreOutOfRange` for the first violation found.
    pub fn validate(&self) -> Result<(), AttemptError> {
        check_opt_score("accuracy", self.accuracy)?;
        check_opt_score("fluency", self.fluency)?;
        check_opt_score("completeness", self.completeness)?;
        check_opt_score("prosody", self.prosody)?;
        check_opt_score("overall", self.overall)?;
        Ok(())
    }

    /// The four measurement axes, paired with their storage field names.
    #[must_use]
    pub fn axes(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("accuracy", self.accuracy),
            ("fluency", self.fluency),
            ("completeness", self.completeness),
            ("prosody", self.prosody),
        ]
    }

    /// The overall score for this attempt.
    ///
    /// The explicitly supplied `overall` is authoritative; otherwise this is
    /// the mean of the present axes, or 0 when no axis was measured.
    #[must_use]
    pub fn effective_overall(&self) -> f64 {
        if let Some(overall) = self.overall {
            return overall;
        }
        let present: Vec<f64> = self.axes().iter().filter_map(|(_, v)| *v).collect();
        if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f64>() / present.len() as f64
        }
    }
}

//
// ─── ATTEMPT ──────────────────────────────────────────────────────────────────
//

/// One recorded utterance against one practice item.
///
/// Attempts are append-only: created once, never mutated or deleted
/// (the owning session's soft delete hides them). An attempt is identified by
/// `(session_id, item_index, ordinal)`; storage assigns the ordinal when the
/// row is inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    id: Option<AttemptId>,
    session_id: SessionId,
    item_index: u32,
    ordinal: u32,
    transcript: String,
    scores: AxisScores,
    words: Vec<WordResult>,
    created_at: DateTime<Utc>,
}

impl Attempt {
    /// Build an attempt, validating every score it carries.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreOutOfRange` for any score outside 0..=100.
    pub fn new(
        session_id: SessionId,
        item_index: u32,
        ordinal: u32,
        transcript: impl Into<String>,
        scores: AxisScores,
        words: Vec<WordResult>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        scores.validate()?;
        for word in &words {
            word.validate()?;
        }
        Ok(Self {
            id: None,
            session_id,
            item_index,
            ordinal,
            transcript: transcript.into(),
            scores,
            words,
            created_at,
        })
    }

    /// Rehydrate an attempt from persisted storage, re-running validation.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ScoreOutOfRange` if persisted data violates the
    /// score-range invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: AttemptId,
        session_id: SessionId,
        item_index: u32,
        ordinal: u32,
        transcript: String,
        scores: AxisScores,
        words: Vec<WordResult>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        let mut attempt = Self::new(
            session_id, item_index, ordinal, transcript, scores, words, created_at,
        )?;
        attempt.id = Some(id);
        Ok(attempt)
    }

    #[must_use]
    pub fn id(&self) -> Option<AttemptId> {
        self.id
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn item_index(&self) -> u32 {
        self.item_index
    }

    /// 1-based position among attempts for the same item.
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    #[must_use]
    pub fn scores(&self) -> &AxisScores {
        &self.scores
    }

    #[must_use]
    pub fn words(&self) -> &[WordResult] {
        &self.words
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Overall score for this attempt; see [`AxisScores::effective_overall`].
    #[must_use]
    pub fn overall_score(&self) -> f64 {
        self.scores.effective_overall()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn scores(accuracy: f64, fluency: f64, completeness: f64, prosody: f64) -> AxisScores {
        AxisScores::new(
            Some(accuracy),
            Some(fluency),
            Some(completeness),
            Some(prosody),
            None,
        )
        .unwrap()
    }

    #[test]
    fn axis_scores_reject_out_of_range_values() {
        let err = AxisScores::new(Some(101.0), None, None, None, None).unwrap_err();
        assert!(matches!(
            err,
            AttemptError::ScoreOutOfRange {
                field: "accuracy",
                ..
            }
        ));

        let err = AxisScores::new(None, None, None, None, Some(-0.5)).unwrap_err();
        assert!(matches!(
            err,
            AttemptError::ScoreOutOfRange { field: "overall", .. }
        ));
    }

    #[test]
    fn explicit_overall_is_authoritative() {
        let s = AxisScores::new(Some(40.0), Some(40.0), Some(40.0), Some(40.0), Some(95.0))
            .unwrap();
        assert_eq!(s.effective_overall(), 95.0);
    }

    #[test]
    fn derived_overall_averages_present_axes_only() {
        let s = AxisScores::new(Some(80.0), Some(60.0), None, None, None).unwrap();
        assert_eq!(s.effective_overall(), 70.0);

        let none = AxisScores::default();
        assert_eq!(none.effective_overall(), 0.0);
    }

    #[test]
    fn word_result_rejects_bad_phoneme_score() {
        let bad = PhonemeScore {
            phoneme: "θ".into(),
            score: 120.0,
        };
        let err =
            WordResult::new("think", false, 55.0, WordErrorKind::Mispronunciation, vec![bad])
                .unwrap_err();
        assert!(matches!(
            err,
            AttemptError::ScoreOutOfRange { field: "phoneme", .. }
        ));
    }

    #[test]
    fn attempt_validates_and_exposes_overall() {
        let words = vec![
            WordResult::new("the", true, 88.0, WordErrorKind::None, vec![]).unwrap(),
        ];
        let attempt = Attempt::new(
            SessionId::new(1),
            0,
            1,
            "the weather is nice",
            scores(80.0, 90.0, 100.0, 70.0),
            words,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(attempt.overall_score(), 85.0);
        assert_eq!(attempt.ordinal(), 1);
        assert_eq!(attempt.id(), None);
    }

    #[test]
    fn from_persisted_revalidates_scores() {
        let err = Attempt::from_persisted(
            AttemptId::new(7),
            SessionId::new(1),
            0,
            1,
            "hi".into(),
            AxisScores {
                accuracy: Some(250.0),
                ..AxisScores::default()
            },
            vec![],
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, AttemptError::ScoreOutOfRange { .. }));
    }
}
