mod attempt;
mod ids;
mod item;
mod session;
mod summary;

pub use attempt::{Attempt, AttemptError, AxisScores, PhonemeScore, WordErrorKind, WordResult};
pub use ids::{AttemptId, SessionId};
pub use item::{
    Difficulty, ItemError, PracticeItem, PracticeMode, ReadAloudItem, TongueTwisterItem,
    TwisterSpeed,
};
pub use session::{Session, SessionError, SessionStatus};
pub use summary::{ItemScore, SessionSummary, SummaryError, WeakPhoneme};
