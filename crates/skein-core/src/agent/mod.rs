//! Integration with the autoagents execution framework.

pub mod memory;

pub use memory::{HistoryMemoryAdapter, chat_message_to_history, history_to_chat_message};
