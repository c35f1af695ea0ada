//! Persisted descriptor used to rehydrate a history cache.

use crate::error::HistoryError;
use serde::{Deserialize, Serialize};
use skein_store::ThreadId;

/// Serializable session state for a history cache.
///
/// Only the identity is carried. A rehydrated cache starts cold and loads the
/// thread from the store on first read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryState {
    /// Thread the cache reads from and flushes to.
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
}

impl HistoryState {
    /// Descriptor for the given thread.
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id: Some(thread_id),
        }
    }

    /// Extract the thread id, rejecting descriptors without a usable one.
    pub fn require_thread_id(&self) -> Result<ThreadId, HistoryError> {
        match &self.thread_id {
            Some(thread_id) if !thread_id.is_blank() => Ok(thread_id.clone()),
            Some(_) => Err(HistoryError::InvalidRehydrationState(
                "thread id is blank".to_string(),
            )),
            None => Err(HistoryError::InvalidRehydrationState(
                "thread id is missing".to_string(),
            )),
        }
    }
}
