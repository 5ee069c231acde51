use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur while building practice items.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("practice item text is empty")]
    EmptyText,
}

//
// ─── SESSION MODE & DIFFICULTY ────────────────────────────────────────────────
//

/// Kind of practice a session runs. Every item in a session carries the
/// variant matching the session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PracticeMode {
    ReadAloud,
    TongueTwisters,
}

impl PracticeMode {
    /// Storage representation of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PracticeMode::ReadAloud => "read-aloud",
            PracticeMode::TongueTwisters => "tongue-twisters",
        }
    }
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Learner proficiency tier a session is pitched at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Storage representation of the difficulty.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// Pace a tongue twister is meant to be delivered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TwisterSpeed {
    Slow,
    Natural,
    Fast,
}

impl TwisterSpeed {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TwisterSpeed::Slow => "slow",
            TwisterSpeed::Natural => "natural",
            TwisterSpeed::Fast => "fast",
        }
    }
}

//
// ─── PRACTICE ITEMS ───────────────────────────────────────────────────────────
//

/// Read-aloud prompt: a short passage plus coaching metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAloudItem {
    pub text: String,
    pub topic: String,
    pub focus_phonemes: Vec<String>,
    pub tips: Vec<String>,
}

impl ReadAloudItem {
    /// Build a read-aloud item.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::EmptyText` if the passage is blank.
    pub fn new(
        text: impl Into<String>,
        topic: impl Into<String>,
        focus_phonemes: Vec<String>,
        tips: Vec<String>,
    ) -> Result<Self, ItemError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ItemError::EmptyText);
        }
        Ok(Self {
            text,
            topic: topic.into(),
            focus_phonemes,
            tips,
        })
    }
}

/// Tongue-twister prompt with a target delivery speed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TongueTwisterItem {
    pub text: String,
    pub target_speed: TwisterSpeed,
    pub target_phonemes: Vec<String>,
    pub tip: String,
}

impl TongueTwisterItem {
    /// Build a tongue-twister item.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::EmptyText` if the twister text is blank.
    pub fn new(
        text: impl Into<String>,
        target_speed: TwisterSpeed,
        target_phonemes: Vec<String>,
        tip: impl Into<String>,
    ) -> Result<Self, ItemError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ItemError::EmptyText);
        }
        Ok(Self {
            text,
            target_speed,
            target_phonemes,
            tip: tip.into(),
        })
    }
}

/// Immutable prompt shown to the learner.
///
/// A session owns a fixed, ordered sequence of these; items are never mutated
/// after the session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PracticeItem {
    ReadAloud(ReadAloudItem),
    TongueTwister(TongueTwisterItem),
}

impl PracticeItem {
    /// The session mode this item variant belongs to.
    #[must_use]
    pub fn mode(&self) -> PracticeMode {
        match self {
            PracticeItem::ReadAloud(_) => PracticeMode::ReadAloud,
            PracticeItem::TongueTwister(_) => PracticeMode::TongueTwisters,
        }
    }

    /// The prompt text the learner is asked to speak.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            PracticeItem::ReadAloud(item) => &item.text,
            PracticeItem::TongueTwister(item) => &item.text,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
