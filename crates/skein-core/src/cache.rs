//! Write-buffered, read-through cache for one conversation thread.

use crate::error::HistoryError;
use crate::fork::{ForkOptions, ForkedHistoryCache, fork};
use crate::history::{ConversationHistory, IoGate, RequeueGuard, cancellable, requeue_front};
use crate::state::HistoryState;
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use skein_store::{MessageStore, StoredMessageRecord, ThreadId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// In-memory state guarded by the cache mutex.
#[derive(Debug, Default)]
struct CacheState {
    /// Records appended since the last successful flush.
    pending: Vec<StoredMessageRecord>,
    /// Persisted snapshot plus everything appended since it was loaded.
    /// `None` until the first successful load.
    merged: Option<Vec<StoredMessageRecord>>,
}

/// History cache for one thread.
///
/// Appends land in a pending buffer and, once the thread has been loaded, in
/// the merged view as well. Reads are served from the merged view after the
/// first load; the store is never re-read for the lifetime of the instance.
/// Flushing is always caller-driven.
pub struct HistoryCache {
    thread_id: ThreadId,
    store: Arc<dyn MessageStore>,
    state: Mutex<CacheState>,
    io: IoGate,
}

impl HistoryCache {
    /// Create an empty, cold cache for a thread.
    pub fn new(thread_id: ThreadId, store: Arc<dyn MessageStore>) -> Self {
        debug!("created history cache (thread_id={})", thread_id);
        Self {
            thread_id,
            store,
            state: Mutex::new(CacheState::default()),
            io: IoGate::default(),
        }
    }

    /// Rebuild a cache from a persisted descriptor. The cache starts cold.
    pub fn from_state(
        state: &HistoryState,
        store: Arc<dyn MessageStore>,
    ) -> Result<Self, HistoryError> {
        let thread_id = state.require_thread_id()?;
        info!("rehydrating history cache (thread_id={})", thread_id);
        Ok(Self::new(thread_id, store))
    }

    /// Whether the merged view has been loaded from the store.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().merged.is_some()
    }

    /// Fork this conversation into an independent branch.
    pub async fn fork(&self, options: ForkOptions) -> Result<ForkedHistoryCache, HistoryError> {
        fork(self, options).await
    }

    /// Copy of the pending buffer.
    fn pending_snapshot(&self) -> Vec<StoredMessageRecord> {
        self.state.lock().pending.clone()
    }
}

impl std::fmt::Debug for HistoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HistoryCache")
            .field("thread_id", &self.thread_id)
            .field("pending", &state.pending.len())
            .field("merged", &state.merged.as_ref().map(Vec::len))
            .finish()
    }
}

#[async_trait]
impl ConversationHistory for HistoryCache {
    fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    fn append(&self, records: Vec<StoredMessageRecord>) {
        if records.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        if let Some(merged) = state.merged.as_mut() {
            merged.extend(records.iter().cloned());
        }
        state.pending.extend(records);
        debug!(
            "appended to history (thread_id={}, pending={})",
            self.thread_id,
            state.pending.len()
        );
    }

    async fn try_read_merged_records_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<StoredMessageRecord>, HistoryError> {
        let cached = self.state.lock().merged.clone();
        if let Some(merged) = cached {
            return Ok(merged);
        }

        let _io = self.io.enter(cancel).await?;
        // Another reader may have finished the load while we waited.
        let cached = self.state.lock().merged.clone();
        if let Some(merged) = cached {
            return Ok(merged);
        }

        let persisted = cancellable(cancel, self.store.get_messages(&self.thread_id)).await?;
        let mut state = self.state.lock();
        let persisted_len = persisted.len();
        let mut merged = persisted;
        merged.extend(state.pending.iter().cloned());
        state.merged = Some(merged.clone());
        debug!(
            "loaded history (thread_id={}, persisted={}, pending={})",
            self.thread_id,
            persisted_len,
            state.pending.len()
        );
        Ok(merged)
    }

    async fn read_merged_records_with(
        &self,
        cancel: &CancellationToken,
    ) -> Vec<StoredMessageRecord> {
        match self.try_read_merged_records_with(cancel).await {
            Ok(merged) => merged,
            Err(HistoryError::Cancelled) => {
                debug!(
                    "history load cancelled; serving pending only (thread_id={})",
                    self.thread_id
                );
                self.pending_snapshot()
            }
            Err(err) => {
                warn!(
                    "history load failed; serving pending only (thread_id={}, error={})",
                    self.thread_id, err
                );
                self.pending_snapshot()
            }
        }
    }

    async fn flush_with(&self, cancel: &CancellationToken) -> Result<(), HistoryError> {
        let _io = self.io.enter(cancel).await?;
        let batch = {
            let mut state = self.state.lock();
            if state.pending.is_empty() {
                return Ok(());
            }
            std::mem::take(&mut state.pending)
        };
        let count = batch.len();
        let guard = RequeueGuard::new(&self.state, batch, |state: &mut CacheState, batch| {
            requeue_front(&mut state.pending, batch)
        });

        let result = cancellable(
            cancel,
            self.store.append_messages(&self.thread_id, guard.batch()),
        )
        .await;
        match result {
            Ok(()) => {
                guard.commit();
                debug!(
                    "flushed history (thread_id={}, records={})",
                    self.thread_id, count
                );
                Ok(())
            }
            Err(err) => {
                drop(guard);
                warn!(
                    "history flush failed; records re-queued (thread_id={}, records={}, error={})",
                    self.thread_id, count, err
                );
                Err(err)
            }
        }
    }

    async fn replace_and_reset_with(
        &self,
        records: Vec<StoredMessageRecord>,
        cancel: &CancellationToken,
    ) -> Result<(), HistoryError> {
        let _io = self.io.enter(cancel).await?;
        cancellable(cancel, self.store.replace_messages(&self.thread_id, &records)).await?;
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        info!(
            "replaced history (thread_id={}, records={}, dropped_pending={})",
            self.thread_id,
            records.len(),
            dropped
        );
        state.merged = Some(records);
        Ok(())
    }

    fn has_pending_writes(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn known_len(&self) -> usize {
        let state = self.state.lock();
        state
            .merged
            .as_ref()
            .map_or(state.pending.len(), Vec::len)
    }
}
