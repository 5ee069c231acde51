#![forbid(unsafe_code)]

pub mod error;
pub mod practice;

pub use speak_core::Clock;

pub use error::PracticeError;
pub use practice::{PracticeHistoryService, PracticeService, SessionOverview};
