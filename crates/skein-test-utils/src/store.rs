use async_trait::async_trait;
use skein_store::{InMemoryMessageStore, MessageStore, StoreError, StoredMessageRecord, ThreadId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// In-memory store that counts calls per operation.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryMessageStore,
    gets: AtomicUsize,
    appends: AtomicUsize,
    replaces: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(thread_id: ThreadId, records: Vec<StoredMessageRecord>) -> Self {
        Self {
            inner: InMemoryMessageStore::with_thread(thread_id, records),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryMessageStore {
        &self.inner
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn replace_calls(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageStore for RecordingStore {
    async fn get_messages(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<StoredMessageRecord>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_messages(thread_id).await
    }

    async fn append_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner.append_messages(thread_id, records).await
    }

    async fn replace_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        self.inner.replace_messages(thread_id, records).await
    }
}

/// In-memory store whose operations can be switched to fail.
#[derive(Default)]
pub struct FailingStore {
    inner: InMemoryMessageStore,
    fail_gets: AtomicBool,
    fail_appends: AtomicBool,
    fail_replaces: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(thread_id: ThreadId, records: Vec<StoredMessageRecord>) -> Self {
        Self {
            inner: InMemoryMessageStore::with_thread(thread_id, records),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryMessageStore {
        &self.inner
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_replaces(&self, fail: bool) {
        self.fail_replaces.store(fail, Ordering::SeqCst);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_gets(fail);
        self.fail_appends(fail);
        self.fail_replaces(fail);
    }
}

fn check(flag: &AtomicBool, operation: &str) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        return Err(StoreError::unavailable(format!("{operation} failed")));
    }
    Ok(())
}

#[async_trait]
impl MessageStore for FailingStore {
    async fn get_messages(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<StoredMessageRecord>, StoreError> {
        check(&self.fail_gets, "get")?;
        self.inner.get_messages(thread_id).await
    }

    async fn append_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        check(&self.fail_appends, "append")?;
        self.inner.append_messages(thread_id, records).await
    }

    async fn replace_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        check(&self.fail_replaces, "replace")?;
        self.inner.replace_messages(thread_id, records).await
    }
}

/// In-memory store that parks every call until `release` is called.
///
/// `wait_for_get` / `wait_for_append` / `wait_for_replace` resolve once a call of that kind has
/// reached the gate, which lets tests interleave work with in-flight I/O.
#[derive(Default)]
pub struct GatedStore {
    inner: InMemoryMessageStore,
    open: AtomicBool,
    gate: Notify,
    get_entered: Notify,
    append_entered: Notify,
    replace_entered: Notify,
    fail_next_append: AtomicBool,
}

impl GatedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(thread_id: ThreadId, records: Vec<StoredMessageRecord>) -> Self {
        Self {
            inner: InMemoryMessageStore::with_thread(thread_id, records),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &InMemoryMessageStore {
        &self.inner
    }

    /// Open the gate for every parked and future call.
    pub fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn fail_next_append(&self) {
        self.fail_next_append.store(true, Ordering::SeqCst);
    }

    pub async fn wait_for_get(&self) {
        self.get_entered.notified().await;
    }

    pub async fn wait_for_append(&self) {
        self.append_entered.notified().await;
    }

    pub async fn wait_for_replace(&self) {
        self.replace_entered.notified().await;
    }

    async fn pass_gate(&self) {
        loop {
            let notified = self.gate.notified();
            if self.open.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MessageStore for GatedStore {
    async fn get_messages(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<StoredMessageRecord>, StoreError> {
        self.get_entered.notify_one();
        self.pass_gate().await;
        self.inner.get_messages(thread_id).await
    }

    async fn append_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        self.append_entered.notify_one();
        self.pass_gate().await;
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(StoreError::unavailable("append failed"));
        }
        self.inner.append_messages(thread_id, records).await
    }

    async fn replace_messages(
        &self,
        thread_id: &ThreadId,
        records: &[StoredMessageRecord],
    ) -> Result<(), StoreError> {
        self.replace_entered.notify_one();
        self.pass_gate().await;
        self.inner.replace_messages(thread_id, records).await
    }
}
