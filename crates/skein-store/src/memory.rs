//! In-memory message store.

use crate::error::StoreError;
use crate::model::{StoredMessageRecord, ThreadId};
use crate::store::MessageStore;
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local store. Data is lost on drop.
///
/// Useful for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    threads: RwLock<HashMap<ThreadId, Vec<StoredMessageRecord>>>,
}

impl InMemoryMessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with one thread's records.
    pub fn with_thread(thread_id: ThreadId, records: Vec<StoredMessageRecord>) -> Self {
        let store = Self::new();
        store.threads.write().insert(thread_id, records);
        store
    }

    /// Number of records persisted for a thread.
    pub fn len(&self, thread_id: &ThreadId) -> usize {
        self.threads.read().get(thread_id).map_or(0, Vec::len)
    }

    /// Synchronous snapshot of a thread's records.
    pub fn snapshot(&self, thread_id: &ThreadId) -> Vec<StoredMessageRecord> {
        self.threads
            .read()
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn get_messages(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<StoredMessageRecord>, StoreError> {
        Ok(self.snapshot(thread_id))
    }

    async fn append_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        let mut threads = self.threads.write();
        let log = threads.entry(thread_id.clone()).or_default();
        log.extend_from_slice(records);
        debug!(
            "appended in-memory records (thread_id={}, added={}, total={})",
            thread_id,
            records.len(),
            log.len()
        );
        Ok(())
    }

    async fn replace_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        self.threads
            .write()
            .insert(thread_id.clone(), records.to_vec());
        debug!(
            "replaced in-memory records (thread_id={}, total={})",
            thread_id,
            records.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryMessageStore;
    use crate::{MessageStore, StoredMessageRecord, ThreadId};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn threads_are_isolated() {
        let store = InMemoryMessageStore::new();
        let a = ThreadId::new("a");
        let b = ThreadId::new("b");
        let record = StoredMessageRecord::new("user", None);
        store
            .append_messages(&a, std::slice::from_ref(&record))
            .await
            .expect("append");

        assert_eq!(store.get_messages(&a).await.expect("get a"), vec![record]);
        assert!(store.get_messages(&b).await.expect("get b").is_empty());
        assert_eq!(store.len(&a), 1);
    }

    #[tokio::test]
    async fn replace_swaps_entire_list() {
        let thread = ThreadId::new("t");
        let store = InMemoryMessageStore::with_thread(
            thread.clone(),
            vec![
                StoredMessageRecord::new("user", None),
                StoredMessageRecord::new("assistant", None),
            ],
        );
        store.replace_messages(&thread, &[]).await.expect("replace");
        assert_eq!(store.len(&thread), 0);
    }
}
