//! Write-buffered, read-through history cache for conversation threads.
//!
//! This crate owns the in-memory merge, flush, and fork state machine that
//! sits in front of a [`skein_store::MessageStore`], the record/message
//! transcoding at its boundary, and the autoagents memory adapter.

pub mod agent;
pub mod cache;
pub mod codec;
pub mod content;
pub mod error;
pub mod fork;
mod history;
pub mod state;

pub use agent::HistoryMemoryAdapter;
/// History cache and its forks.
pub use cache::HistoryCache;
pub use content::{ContentItem, HistoryMessage};
pub use error::HistoryError;
pub use fork::{ForkOptions, ForkPersistence, ForkedHistoryCache, fork};
pub use history::ConversationHistory;
pub use state::HistoryState;
/// Re-exported store types used throughout the public API.
pub use skein_store::{MessageStore, StoreError, StoredMessageRecord, ThreadId};
/// Re-exported so callers can build cancellation tokens without a direct dependency.
pub use tokio_util::sync::CancellationToken;
