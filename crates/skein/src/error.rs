//! Errors raised while wiring configuration into stores and caches.

use thiserror::Error;

/// Errors returned by the SDK setup helpers.
#[derive(Debug, Error)]
pub enum SkeinError {
    /// Config loading or validation failed.
    #[error("config error: {0}")]
    Config(#[from] skein_config::ConfigError),
    /// The configured store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] skein_store::StoreError),
    /// A history operation failed.
    #[error("history error: {0}")]
    History(#[from] skein_core::HistoryError),
}
