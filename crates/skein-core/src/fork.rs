//! Forked conversation branches.
//!
//! A fork copies the merged view of its origin once and never looks at the
//! origin again. New turns go into the fork's own pending buffer and are
//! flushed under the fork's own thread id.

use crate::error::HistoryError;
use crate::history::{ConversationHistory, IoGate, RequeueGuard, cancellable, requeue_front};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use skein_store::{MessageStore, StoredMessageRecord, ThreadId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a fork writes to its own thread when flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkPersistence {
    /// Write the inherited baseline ahead of the first flushed batch, so the
    /// fork's thread can later be rehydrated on its own.
    #[default]
    WithBaseline,
    /// Write only turns appended to the fork.
    PendingOnly,
}

/// Options for [`fork`].
#[derive(Clone, Default)]
pub struct ForkOptions {
    /// Thread id for the fork. A fresh id is generated when unset.
    pub thread_id: Option<ThreadId>,
    /// Store the fork flushes to. Defaults to the origin's store.
    pub store: Option<Arc<dyn MessageStore>>,
    /// Persistence mode for the baseline.
    pub persistence: ForkPersistence,
}

impl ForkOptions {
    /// Use an explicit thread id for the fork.
    pub fn with_thread_id(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    /// Flush the fork to a different store than its origin.
    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Choose how the baseline is persisted.
    pub fn with_persistence(mut self, persistence: ForkPersistence) -> Self {
        self.persistence = persistence;
        self
    }
}

/// Create an independent branch of `origin`.
///
/// Reads the origin's merged view (which may load it from the store) and
/// copies it into the fork's baseline. The origin is not locked or modified
/// beyond what a normal read does. A cold origin whose load fails yields
/// `HistoryError::Store` rather than a fork over a truncated history.
pub async fn fork<H>(origin: &H, options: ForkOptions) -> Result<ForkedHistoryCache, HistoryError>
where
    H: ConversationHistory + ?Sized,
{
    let thread_id = options.thread_id.unwrap_or_else(ThreadId::generate);
    if &thread_id == origin.thread_id() {
        return Err(HistoryError::ForkIdCollision(thread_id));
    }
    let baseline = origin.try_read_merged_records().await?;
    let store = options.store.unwrap_or_else(|| origin.store().clone());
    info!(
        "forked history (origin={}, fork={}, baseline={})",
        origin.thread_id(),
        thread_id,
        baseline.len()
    );
    Ok(ForkedHistoryCache::new(
        thread_id,
        Some(origin.thread_id().clone()),
        baseline,
        store,
        options.persistence,
    ))
}

#[derive(Debug)]
struct ForkState {
    /// Frozen copy of the origin's merged view at fork time.
    baseline: Vec<StoredMessageRecord>,
    pending: Vec<StoredMessageRecord>,
    /// Whether the baseline already lives under the fork's thread id.
    baseline_persisted: bool,
}

/// History branch that starts from a frozen baseline.
///
/// The merged view is `baseline ++ pending`; the store is never read to build
/// it.
pub struct ForkedHistoryCache {
    thread_id: ThreadId,
    parent_thread_id: Option<ThreadId>,
    store: Arc<dyn MessageStore>,
    persistence: ForkPersistence,
    state: Mutex<ForkState>,
    io: IoGate,
}

impl ForkedHistoryCache {
    /// Build a fork over an explicit baseline.
    pub fn new(
        thread_id: ThreadId,
        parent_thread_id: Option<ThreadId>,
        baseline: Vec<StoredMessageRecord>,
        store: Arc<dyn MessageStore>,
        persistence: ForkPersistence,
    ) -> Self {
        let baseline_persisted = baseline.is_empty() || persistence == ForkPersistence::PendingOnly;
        Self {
            thread_id,
            parent_thread_id,
            store,
            persistence,
            state: Mutex::new(ForkState {
                baseline,
                pending: Vec::new(),
                baseline_persisted,
            }),
            io: IoGate::default(),
        }
    }

    /// Thread id of the conversation this fork was taken from.
    pub fn parent_thread_id(&self) -> Option<&ThreadId> {
        self.parent_thread_id.as_ref()
    }

    /// Persistence mode of this fork.
    pub fn persistence(&self) -> ForkPersistence {
        self.persistence
    }

    /// Copy of the frozen baseline.
    pub fn baseline(&self) -> Vec<StoredMessageRecord> {
        self.state.lock().baseline.clone()
    }

    /// Fork this branch again.
    pub async fn fork(&self, options: ForkOptions) -> Result<ForkedHistoryCache, HistoryError> {
        fork(self, options).await
    }
}

impl std::fmt::Debug for ForkedHistoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ForkedHistoryCache")
            .field("thread_id", &self.thread_id)
            .field("parent_thread_id", &self.parent_thread_id)
            .field("baseline", &state.baseline.len())
            .field("pending", &state.pending.len())
            .field("persistence", &self.persistence)
            .finish()
    }
}

#[async_trait]
impl ConversationHistory for ForkedHistoryCache {
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
        state.pending.extend(records);
        debug!(
            "appended to fork (thread_id={}, pending={})",
            self.thread_id,
            state.pending.len()
        );
    }

    async fn try_read_merged_records_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<StoredMessageRecord>, HistoryError> {
        Ok(self.read_merged_records_with(cancel).await)
    }

    async fn read_merged_records_with(
        &self,
        _cancel: &CancellationToken,
    ) -> Vec<StoredMessageRecord> {
        let state = self.state.lock();
        let mut merged = Vec::with_capacity(state.baseline.len() + state.pending.len());
        merged.extend(state.baseline.iter().cloned());
        merged.extend(state.pending.iter().cloned());
        merged
    }

    async fn flush_with(&self, cancel: &CancellationToken) -> Result<(), HistoryError> {
        let _io = self.io.enter(cancel).await?;
        let (batch, baseline) = {
            let mut state = self.state.lock();
            let baseline = if state.baseline_persisted {
                Vec::new()
            } else {
                state.baseline.clone()
            };
            if state.pending.is_empty() && baseline.is_empty() {
                return Ok(());
            }
            state.baseline_persisted = true;
            (std::mem::take(&mut state.pending), baseline)
        };
        let with_baseline = !baseline.is_empty();
        let count = batch.len();
        let guard = RequeueGuard::new(&self.state, batch, move |state: &mut ForkState, batch| {
            requeue_front(&mut state.pending, batch);
            if with_baseline {
                state.baseline_persisted = false;
            }
        });

        let result = if with_baseline {
            let mut records = baseline;
            records.extend(guard.batch().iter().cloned());
            cancellable(cancel, self.store.append_messages(&self.thread_id, &records)).await
        } else {
            cancellable(
                cancel,
                self.store.append_messages(&self.thread_id, guard.batch()),
            )
            .await
        };
        match result {
            Ok(()) => {
                guard.commit();
                debug!(
                    "flushed fork (thread_id={}, records={}, with_baseline={})",
                    self.thread_id, count, with_baseline
                );
                Ok(())
            }
            Err(err) => {
                drop(guard);
                warn!(
                    "fork flush failed; records re-queued (thread_id={}, records={}, error={})",
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
        info!(
            "replaced fork history (thread_id={}, records={}, dropped_pending={})",
            self.thread_id,
            records.len(),
            state.pending.len()
        );
        state.pending.clear();
        state.baseline = records;
        state.baseline_persisted = true;
        Ok(())
    }

    /// Also true while a baseline still has to be written under the fork's id.
    fn has_pending_writes(&self) -> bool {
        let state = self.state.lock();
        !state.pending.is_empty() || !state.baseline_persisted
    }

    /// Counts the unwritten baseline along with appended records.
    fn pending_len(&self) -> usize {
        let state = self.state.lock();
        let baseline = if state.baseline_persisted {
            0
        } else {
            state.baseline.len()
        };
        baseline + state.pending.len()
    }

    fn known_len(&self) -> usize {
        let state = self.state.lock();
        state.baseline.len() + state.pending.len()
    }
}
