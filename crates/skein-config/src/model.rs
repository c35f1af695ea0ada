//! Configuration schema for skein.

use serde::{Deserialize, Serialize};

/// Root config.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SkeinConfig {
    #[serde(default, rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl SkeinConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> SkeinConfigBuilder {
        SkeinConfigBuilder::new()
    }
}

/// Builder for assembling a `SkeinConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct SkeinConfigBuilder {
    config: SkeinConfig,
}

impl SkeinConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: SkeinConfig::default(),
        }
    }

    /// Replace the store configuration.
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    /// Replace the history cache configuration.
    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.config.history = history;
        self
    }

    /// Finalize and return the built `SkeinConfig`.
    pub fn build(self) -> SkeinConfig {
        self.config
    }
}

/// Backend used to persist thread logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local store; nothing survives a restart.
    #[default]
    Memory,
    /// One JSONL file per thread under `path`.
    Jsonl,
}

/// Store selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Root directory for file-backed stores.
    #[serde(default)]
    pub path: Option<String>,
}

/// Baseline persistence for forks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ForkPersistenceMode {
    #[default]
    WithBaseline,
    PendingOnly,
}

/// History cache behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    #[serde(default)]
    pub fork_persistence: ForkPersistenceMode,
    /// Default number of recent messages handed to agents on recall.
    #[serde(default)]
    pub recall_limit: Option<usize>,
    /// Flush after every assistant reply instead of leaving it to the caller.
    #[serde(default)]
    pub flush_after_assistant: bool,
}
