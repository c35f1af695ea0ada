//! Configuration models and config loading.
//!
//! This crate owns the skein config schema, validation, and the layer-merging
//! logic used when wiring stores and history caches together.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config result and default layer discovery.
pub use loader::{LayeredConfig, default_layer_paths};
/// Configuration schema models.
pub use model::*;
