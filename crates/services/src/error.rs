//! Shared error types for the services crate.

use thiserror::Error;

use speak_core::aggregate::AggregateError;
use speak_core::model::{SessionError, SessionStatus};
use storage::repository::StorageError;

/// Errors emitted by the practice services.
///
/// Nothing here is retried internally; callers own retry policy and receive
/// these as typed failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("session not found")]
    NotFound,

    #[error("operation requires an active session, status is {status}")]
    InvalidState { status: SessionStatus },

    #[error("item index {item_index} is out of range for {item_count} items")]
    OutOfRange { item_index: u32, item_count: u32 },

    #[error("session has no attempts to summarize")]
    EmptySession,

    #[error("attempt data failed integrity checks")]
    DataIntegrity(#[source] AggregateError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
