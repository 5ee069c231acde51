mod service;
mod view;

// Public API of the practice subsystem.
pub use crate::error::PracticeError;
pub use service::PracticeService;
pub use view::{PracticeHistoryService, SessionOverview};
