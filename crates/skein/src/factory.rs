//! Builds stores and history caches from config.

use crate::error::SkeinError;
use log::info;
use skein_config::{ForkPersistenceMode, HistoryConfig, SkeinConfig, StoreBackend, StoreConfig};
use skein_core::{
    ConversationHistory, ForkOptions, ForkPersistence, ForkedHistoryCache, HistoryCache,
    HistoryError, HistoryMemoryAdapter, HistoryState,
};
use skein_store::{InMemoryMessageStore, JsonlMessageStore, MessageStore, StoreError, ThreadId};
use std::sync::Arc;

/// Open the store selected by config.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn MessageStore>, SkeinError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("opening in-memory message store");
            Ok(Arc::new(InMemoryMessageStore::new()))
        }
        StoreBackend::Jsonl => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| StoreError::unavailable("jsonl store requires a path"))?;
            Ok(Arc::new(JsonlMessageStore::new(path)?))
        }
    }
}

/// Creates, rehydrates, and forks history caches over one store.
#[derive(Clone)]
pub struct HistoryFactory {
    store: Arc<dyn MessageStore>,
    config: HistoryConfig,
}

impl HistoryFactory {
    /// Create a factory over an existing store.
    pub fn new(store: Arc<dyn MessageStore>, config: HistoryConfig) -> Self {
        Self { store, config }
    }

    /// Validate config and open its store.
    pub fn from_config(config: &SkeinConfig) -> Result<Self, SkeinError> {
        config.validate()?;
        let store = open_store(&config.store)?;
        Ok(Self::new(store, config.history.clone()))
    }

    /// Store shared by every cache this factory creates.
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Cold cache for an existing thread.
    pub fn open(&self, thread_id: ThreadId) -> HistoryCache {
        HistoryCache::new(thread_id, self.store.clone())
    }

    /// Cache for a brand new thread with a generated id.
    pub fn create(&self) -> HistoryCache {
        self.open(ThreadId::generate())
    }

    /// Rebuild a cache from persisted session state.
    pub fn rehydrate(&self, state: &HistoryState) -> Result<HistoryCache, HistoryError> {
        HistoryCache::from_state(state, self.store.clone())
    }

    /// Fork a conversation using the configured baseline persistence.
    pub async fn fork<H>(
        &self,
        origin: &H,
        thread_id: Option<ThreadId>,
    ) -> Result<ForkedHistoryCache, HistoryError>
    where
        H: ConversationHistory + ?Sized,
    {
        let options = ForkOptions {
            thread_id,
            store: Some(self.store.clone()),
            persistence: fork_persistence(self.config.fork_persistence),
        };
        skein_core::fork(origin, options).await
    }

    /// Memory adapter for an agent, using the configured recall and flush
    /// settings.
    pub fn memory_adapter(&self, history: Arc<dyn ConversationHistory>) -> HistoryMemoryAdapter {
        HistoryMemoryAdapter::new(history)
            .with_recall_limit(self.config.recall_limit)
            .with_flush_after_assistant(self.config.flush_after_assistant)
    }
}

/// Map fork persistence from config to the runtime enum.
fn fork_persistence(mode: ForkPersistenceMode) -> ForkPersistence {
    match mode {
        ForkPersistenceMode::WithBaseline => ForkPersistence::WithBaseline,
        ForkPersistenceMode::PendingOnly => ForkPersistence::PendingOnly,
    }
}
