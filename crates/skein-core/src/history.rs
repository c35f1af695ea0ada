//! Common surface of the cache and its forks, plus the plumbing they share.

use crate::codec;
use crate::content::HistoryMessage;
use crate::error::HistoryError;
use crate::state::HistoryState;
use async_trait::async_trait;
use parking_lot::Mutex;
use skein_store::{MessageStore, StoredMessageRecord, ThreadId};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio_util::sync::CancellationToken;

#[async_trait]
/// A conversation log with buffered writes.
///
/// Implemented by [`crate::HistoryCache`] and [`crate::ForkedHistoryCache`]. All
/// read operations return independent copies; nothing hands out references to
/// internal buffers.
pub trait ConversationHistory: Send + Sync {
    /// Thread this history reads from and flushes to.
    fn thread_id(&self) -> &ThreadId;

    /// Store backing this history.
    fn store(&self) -> &Arc<dyn MessageStore>;

    /// Append records to the pending buffer (and the merged view when loaded).
    fn append(&self, records: Vec<StoredMessageRecord>);

    /// Encode and append caller messages.
    fn append_messages(&self, messages: &[HistoryMessage]) {
        self.append(codec::encode_all(messages));
    }

    /// Merged view as raw records, reporting a failed or cancelled store load
    /// instead of degrading to the pending buffer.
    async fn try_read_merged_records_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<StoredMessageRecord>, HistoryError>;

    /// Merged view as raw records, reporting a failed store load.
    async fn try_read_merged_records(&self) -> Result<Vec<StoredMessageRecord>, HistoryError> {
        self.try_read_merged_records_with(&CancellationToken::new())
            .await
    }

    /// Merged view as raw records, honouring cancellation of any store load.
    async fn read_merged_records_with(
        &self,
        cancel: &CancellationToken,
    ) -> Vec<StoredMessageRecord>;

    /// Merged view as raw records.
    async fn read_merged_records(&self) -> Vec<StoredMessageRecord> {
        self.read_merged_records_with(&CancellationToken::new())
            .await
    }

    /// Merged, decoded view honouring cancellation of any store load.
    async fn read_merged_with(&self, cancel: &CancellationToken) -> Vec<HistoryMessage> {
        let records = self.read_merged_records_with(cancel).await;
        codec::decode_all(&records)
    }

    /// Merged, decoded view.
    async fn read_merged(&self) -> Vec<HistoryMessage> {
        self.read_merged_with(&CancellationToken::new()).await
    }

    /// Write pending records to the store, honouring cancellation.
    async fn flush_with(&self, cancel: &CancellationToken) -> Result<(), HistoryError>;

    /// Write pending records to the store.
    async fn flush(&self) -> Result<(), HistoryError> {
        self.flush_with(&CancellationToken::new()).await
    }

    /// Replace the persisted log and reset in-memory state, honouring
    /// cancellation. Unflushed records are discarded.
    async fn replace_and_reset_with(
        &self,
        records: Vec<StoredMessageRecord>,
        cancel: &CancellationToken,
    ) -> Result<(), HistoryError>;

    /// Replace the persisted log and reset in-memory state.
    async fn replace_and_reset(&self, records: Vec<StoredMessageRecord>) -> Result<(), HistoryError> {
        self.replace_and_reset_with(records, &CancellationToken::new())
            .await
    }

    /// Whether any appended records have not been flushed yet.
    fn has_pending_writes(&self) -> bool;

    /// Number of records waiting to be flushed.
    fn pending_len(&self) -> usize;

    /// Number of messages known in memory without touching the store.
    fn known_len(&self) -> usize;

    /// Persisted records for this thread, read straight from the store.
    async fn raw_stored_messages(&self) -> Result<Vec<StoredMessageRecord>, HistoryError> {
        Ok(self.store().get_messages(self.thread_id()).await?)
    }

    /// Descriptor to persist alongside the owning session.
    fn state(&self) -> HistoryState {
        HistoryState::new(self.thread_id().clone())
    }
}

/// Serializes store I/O for one history instance.
///
/// In-memory operations never wait on this gate; only store calls queue
/// behind each other, which keeps flushed batches in append order and stops a
/// load from racing a flush of the same records.
#[derive(Debug, Default)]
pub(crate) struct IoGate(AsyncMutex<()>);

impl IoGate {
    /// Acquire the gate unless the token fires first.
    pub(crate) async fn enter(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AsyncMutexGuard<'_, ()>, HistoryError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HistoryError::Cancelled),
            guard = self.0.lock() => Ok(guard),
        }
    }
}

/// Race a store call against a cancellation token.
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    call: F,
) -> Result<T, HistoryError>
where
    F: Future<Output = Result<T, skein_store::StoreError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HistoryError::Cancelled),
        result = call => result.map_err(HistoryError::from),
    }
}

/// Puts a drained batch back at the front of the pending buffer unless the
/// flush that drained it completes.
///
/// Restoring on drop covers both explicit failure and a flush future that is
/// dropped mid-call.
pub(crate) struct RequeueGuard<'a, S, F>
where
    F: FnOnce(&mut S, Vec<StoredMessageRecord>),
{
    state: &'a Mutex<S>,
    batch: Option<Vec<StoredMessageRecord>>,
    restore: Option<F>,
}

impl<'a, S, F> RequeueGuard<'a, S, F>
where
    F: FnOnce(&mut S, Vec<StoredMessageRecord>),
{
    pub(crate) fn new(state: &'a Mutex<S>, batch: Vec<StoredMessageRecord>, restore: F) -> Self {
        Self {
            state,
            batch: Some(batch),
            restore: Some(restore),
        }
    }

    /// Records currently held by the guard.
    pub(crate) fn batch(&self) -> &[StoredMessageRecord] {
        self.batch.as_deref().unwrap_or_default()
    }

    /// Mark the batch as durable; nothing is restored.
    pub(crate) fn commit(mut self) {
        self.batch = None;
        self.restore = None;
    }
}

impl<S, F> Drop for RequeueGuard<'_, S, F>
where
    F: FnOnce(&mut S, Vec<StoredMessageRecord>),
{
    fn drop(&mut self) {
        if let (Some(batch), Some(restore)) = (self.batch.take(), self.restore.take()) {
            let mut state = self.state.lock();
            restore(&mut *state, batch);
        }
    }
}

/// Prepend `batch` to `pending`, keeping anything appended meanwhile after it.
pub(crate) fn requeue_front(pending: &mut Vec<StoredMessageRecord>, mut batch: Vec<StoredMessageRecord>) {
    batch.append(pending);
    *pending = batch;
}
