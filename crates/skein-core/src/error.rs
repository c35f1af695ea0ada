//! Error types for the history cache crate.

use skein_store::{StoreError, ThreadId};
use thiserror::Error;

/// Errors returned by history cache operations.
///
/// Reads never return these: a failed load degrades to the pending buffer.
/// Flush and replace surface them after in-memory state has been restored.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The backing store call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The caller cancelled the operation before the store call resolved.
    #[error("operation cancelled")]
    Cancelled,
    /// A persisted state descriptor could not be turned back into a cache.
    #[error("invalid rehydration state: {0}")]
    InvalidRehydrationState(String),
    /// A fork was asked to reuse the thread id of the conversation it forks.
    #[error("fork thread id collides with origin: {0}")]
    ForkIdCollision(ThreadId),
}

impl HistoryError {
    /// True when the failure came from the store reporting itself unavailable.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_unavailable())
    }
}
