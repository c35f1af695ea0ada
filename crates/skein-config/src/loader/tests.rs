//! Tests for configuration loading.

use super::*;
use crate::{ForkPersistenceMode, HistoryConfig, StoreConfig};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

/// Verify that a minimal config parses with defaults.
#[test]
fn parse_minimal_config() {
    let config = SkeinConfig::load_from_str("{}").expect("config");
    assert_eq!(config, SkeinConfig::default());
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(
        config.history.fork_persistence,
        ForkPersistenceMode::WithBaseline
    );
}

/// JSON5 syntax (comments, unquoted keys, trailing commas) is accepted.
#[test]
fn parse_json5_config() {
    let json5 = r#"{
        // file store
        store: { backend: "jsonl", path: "/tmp/threads", },
        history: { recall_limit: 20, fork_persistence: "pending_only" },
    }"#;
    let config = SkeinConfig::load_from_str(json5).expect("config");
    assert_eq!(
        config.store,
        StoreConfig {
            backend: StoreBackend::Jsonl,
            path: Some("/tmp/threads".to_string()),
        }
    );
    assert_eq!(
        config.history,
        HistoryConfig {
            fork_persistence: ForkPersistenceMode::PendingOnly,
            recall_limit: Some(20),
            flush_after_assistant: false,
        }
    );
}

/// Reject unexpected config keys.
#[test]
fn rejects_unknown_key() {
    let err = SkeinConfig::load_from_str("{ unexpected: true }").unwrap_err();
    assert!(matches!(err, ConfigError::DecodeFailed(_)));
}

/// A JSONL store without a path is invalid.
#[test]
fn rejects_jsonl_without_path() {
    let err = SkeinConfig::load_from_str(r#"{ store: { backend: "jsonl" } }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("store.path"));
}

/// A zero recall limit is rejected.
#[test]
fn rejects_zero_recall_limit() {
    let err = SkeinConfig::load_from_str("{ history: { recall_limit: 0 } }").unwrap_err();
    assert!(format!("{err}").contains("history.recall_limit"));
}

/// Later layers override earlier ones key by key.
#[test]
fn layered_config_merges_in_order() {
    let temp = TempDir::new().expect("tmp");
    let user = temp.path().join("user.json5");
    let local = temp.path().join("local.json5");
    let missing = temp.path().join("missing.json5");
    fs::write(
        &user,
        r#"{ store: { backend: "jsonl", path: "/srv/skein" }, history: { recall_limit: 10 } }"#,
    )
    .expect("write user");
    fs::write(&local, "{ history: { flush_after_assistant: true } }").expect("write local");

    let layered = SkeinConfig::load_layered_from(&[user.clone(), missing, local.clone()])
        .expect("layered");
    assert_eq!(layered.layers, vec![user, local]);
    assert_eq!(layered.config.store.backend, StoreBackend::Jsonl);
    assert_eq!(layered.config.history.recall_limit, Some(10));
    assert!(layered.config.history.flush_after_assistant);
}

/// A `null` in a later layer resets a setting to its default.
#[test]
fn later_layer_null_resets_setting() {
    let temp = TempDir::new().expect("tmp");
    let user = temp.path().join("user.json5");
    let local = temp.path().join("local.json5");
    fs::write(&user, "{ history: { recall_limit: 10, flush_after_assistant: true } }")
        .expect("write user");
    fs::write(&local, "{ history: { recall_limit: null } }").expect("write local");

    let layered = SkeinConfig::load_layered_from(&[user, local]).expect("layered");
    assert_eq!(layered.config.history.recall_limit, None);
    assert!(layered.config.history.flush_after_assistant);
}

/// Load a config file directly from disk.
#[test]
fn load_from_path_reads_file() {
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join(DEFAULT_CONFIG_FILE);
    fs::write(&path, "{ history: { recall_limit: 3 } }").expect("write");
    let config = SkeinConfig::load_from_path(&path).expect("config");
    assert_eq!(config.history.recall_limit, Some(3));
}

/// Default layers end with the working-directory file.
#[test]
fn default_layers_end_in_cwd() {
    let temp = TempDir::new().expect("tmp");
    let paths = default_layer_paths(temp.path());
    assert_eq!(paths.last(), Some(&temp.path().join(DEFAULT_CONFIG_FILE)));
}
