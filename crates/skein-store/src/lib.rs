//! Durable message storage for skein conversation threads.
//!
//! The history cache treats a store as an opaque, asynchronous ordered list of
//! records per thread. This crate defines that contract and ships an
//! in-memory and a JSONL-on-disk implementation.

pub mod error;
pub mod memory;
pub mod model;
pub mod store;

/// Store error type.
pub use error::StoreError;
/// In-memory store implementation.
pub use memory::InMemoryMessageStore;
/// Persisted record model and thread identity.
pub use model::{StoredMessageRecord, ThreadId};
/// Store interface and default file implementation.
pub use store::{JsonlMessageStore, MessageStore};
