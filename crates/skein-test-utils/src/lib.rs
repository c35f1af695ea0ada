//! Test helpers shared across skein crates.

pub mod store;

pub use store::{FailingStore, GatedStore, RecordingStore};
