//! End-to-end behaviour of the history cache, forks, and their store contract.

use pretty_assertions::assert_eq;
use skein_core::{
    ConversationHistory, ForkOptions, HistoryCache, HistoryMessage, StoredMessageRecord, ThreadId,
    codec,
};
use skein_store::{JsonlMessageStore, MessageStore};
use skein_test_utils::{FailingStore, RecordingStore};
use std::sync::Arc;
use tempfile::tempdir;

fn texts(messages: &[HistoryMessage]) -> Vec<String> {
    messages.iter().map(HistoryMessage::text_content).collect()
}

/// A single appended user turn is readable while the store is down.
#[tokio::test]
async fn scenario_a_pending_only_read() {
    let store = Arc::new(FailingStore::new());
    store.fail_all(true);
    let cache = HistoryCache::new(ThreadId::new("a"), store.clone());
    cache.append_messages(&[HistoryMessage::user("hi")]);

    let messages = cache.read_merged().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].text_content(), "hi");

    assert!(cache.flush().await.is_err());
    assert!(cache.has_pending_writes());
    assert_eq!(store.inner().len(&ThreadId::new("a")), 0);
}

/// A cold read loads once; the second read is served from memory.
#[tokio::test]
async fn scenario_b_cold_load_then_warm() {
    let thread = ThreadId::new("b");
    let store = Arc::new(RecordingStore::seeded(
        thread.clone(),
        codec::encode_all(&[HistoryMessage::user("hello")]),
    ));
    let cache = HistoryCache::new(thread, store.clone());

    assert_eq!(texts(&cache.read_merged().await), vec!["hello"]);
    assert!(cache.is_loaded());
    assert_eq!(texts(&cache.read_merged().await), vec!["hello"]);
    assert_eq!(store.get_calls(), 1);
}

/// Flushing three turns leaves nothing pending and the view unchanged.
#[tokio::test]
async fn scenario_c_flush_keeps_view() {
    let store = Arc::new(RecordingStore::new());
    let cache = HistoryCache::new(ThreadId::new("c"), store.clone());
    let _ = cache.read_merged().await;
    cache.append_messages(&[
        HistoryMessage::user("1"),
        HistoryMessage::assistant("2"),
        HistoryMessage::user("3"),
    ]);

    cache.flush().await.expect("flush");
    assert!(!cache.has_pending_writes());
    assert_eq!(texts(&cache.read_merged().await), vec!["1", "2", "3"]);
    assert_eq!(store.get_calls(), 1);
}

/// A fork of a two-message conversation diverges without touching it.
#[tokio::test]
async fn scenario_d_fork_isolation() {
    let thread = ThreadId::new("d");
    let store = Arc::new(RecordingStore::seeded(
        thread.clone(),
        codec::encode_all(&[HistoryMessage::user("q"), HistoryMessage::assistant("a")]),
    ));
    let origin = HistoryCache::new(thread, store);
    let branch = origin.fork(ForkOptions::default()).await.expect("fork");

    branch.append_messages(&[HistoryMessage::user("branch turn")]);
    assert_eq!(branch.read_merged().await.len(), 3);
    assert_eq!(origin.read_merged().await.len(), 2);

    origin.append_messages(&[HistoryMessage::user("origin turn")]);
    assert_eq!(
        texts(&branch.read_merged().await),
        vec!["q", "a", "branch turn"]
    );
}

/// A failed flush keeps the failed batch ahead of later appends.
#[tokio::test]
async fn failed_flush_preserves_order() {
    let store = Arc::new(FailingStore::new());
    let cache = HistoryCache::new(ThreadId::new("p3"), store.clone());
    cache.append_messages(&[HistoryMessage::user("1"), HistoryMessage::user("2")]);

    store.fail_appends(true);
    assert!(cache.flush().await.is_err());
    assert!(cache.has_pending_writes());
    cache.append_messages(&[HistoryMessage::user("3")]);
    assert_eq!(cache.pending_len(), 3);

    store.fail_appends(false);
    cache.flush().await.expect("flush");
    let persisted = codec::decode_all(&store.inner().snapshot(&ThreadId::new("p3")));
    assert_eq!(texts(&persisted), vec!["1", "2", "3"]);
}

/// A corrupt record decodes to empty content without hiding its neighbours.
#[tokio::test]
async fn corrupt_record_does_not_break_read() {
    let thread = ThreadId::new("p5");
    let mut records = codec::encode_all(&[HistoryMessage::user("before")]);
    records.push(
        StoredMessageRecord::new("assistant", Some("not valid json".to_string()))
            .with_author("bot"),
    );
    records.extend(codec::encode_all(&[HistoryMessage::user("after")]));
    let store = Arc::new(RecordingStore::seeded(thread.clone(), records));
    let cache = HistoryCache::new(thread, store);

    let messages = cache.read_merged().await;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, "assistant");
    assert_eq!(messages[1].author_name.as_deref(), Some("bot"));
    assert!(messages[1].contents.is_empty());
    assert_eq!(texts(&messages), vec!["before", "", "after"]);
}

/// Data flushed to a file store survives into a rehydrated cache, and a
/// persisted fork can be reopened under its own thread id.
#[tokio::test]
async fn jsonl_store_survives_rehydration_and_forks() {
    let temp = tempdir().expect("tempdir");
    let store: Arc<dyn MessageStore> =
        Arc::new(JsonlMessageStore::new(temp.path()).expect("store"));
    let origin = HistoryCache::new(ThreadId::new("main"), store.clone());
    origin.append_messages(&[HistoryMessage::user("q"), HistoryMessage::assistant("a")]);
    origin.flush().await.expect("flush origin");

    let branch = origin
        .fork(ForkOptions::default().with_thread_id(ThreadId::new("main-alt")))
        .await
        .expect("fork");
    branch.append_messages(&[HistoryMessage::user("alt")]);
    branch.flush().await.expect("flush branch");

    let reopened: Arc<dyn MessageStore> =
        Arc::new(JsonlMessageStore::new(temp.path()).expect("reopen"));
    let main = HistoryCache::from_state(&origin.state(), reopened.clone()).expect("main");
    let alt = HistoryCache::from_state(&branch.state(), reopened).expect("alt");
    assert_eq!(texts(&main.read_merged().await), vec!["q", "a"]);
    assert_eq!(texts(&alt.read_merged().await), vec!["q", "a", "alt"]);
}

/// A torn trailing line in a thread file does not stop the conversation.
#[tokio::test]
async fn torn_thread_file_keeps_conversation_working() {
    let temp = tempdir().expect("tempdir");
    let store: Arc<dyn MessageStore> =
        Arc::new(JsonlMessageStore::new(temp.path()).expect("store"));
    let thread = ThreadId::new("torn");
    let first = HistoryCache::new(thread.clone(), store.clone());
    first.append_messages(&[HistoryMessage::user("one")]);
    first.flush().await.expect("flush one");

    let path = temp.path().join("torn.jsonl");
    let mut contents = std::fs::read_to_string(&path).expect("read");
    contents.push_str("{\"role\":\"us");
    std::fs::write(&path, contents).expect("tear");

    let cache = HistoryCache::new(thread.clone(), store.clone());
    cache.append_messages(&[HistoryMessage::user("two")]);
    cache.flush().await.expect("flush two");
    assert_eq!(texts(&cache.read_merged().await), vec!["one", "two"]);
    assert!(cache.is_loaded());

    let persisted = codec::decode_all(&store.get_messages(&thread).await.expect("get"));
    assert_eq!(texts(&persisted), vec!["one", "two"]);
}

/// Concurrent appenders are all reflected once, in some serial order.
#[tokio::test]
async fn concurrent_appends_are_not_lost() {
    let store = Arc::new(RecordingStore::new());
    let cache = Arc::new(HistoryCache::new(ThreadId::new("many"), store.clone()));
    let mut tasks = Vec::new();
    for worker in 0..8 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            for turn in 0..25 {
                cache.append_messages(&[HistoryMessage::user(format!("{worker}-{turn}"))]);
                if turn % 10 == 0 {
                    let _ = cache.read_merged().await;
                }
            }
        }));
    }
    for task in tasks {
        task.await.expect("join");
    }
    cache.flush().await.expect("flush");

    assert_eq!(cache.read_merged().await.len(), 200);
    assert_eq!(store.inner().len(&ThreadId::new("many")), 200);
}
