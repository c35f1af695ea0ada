//! Public SDK surface for skein.
//!
//! This crate re-exports the building blocks and wires configuration into
//! stores and history caches so consumer setup stays consistent.

mod error;
mod factory;

/// Re-export for convenience.
pub use skein_config as config;
/// Re-export for convenience.
pub use skein_core as core;
/// Re-export for convenience.
pub use skein_store as store;

pub use error::SkeinError;
pub use factory::{HistoryFactory, open_store};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
