//! Record model persisted by message stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity key of one durable conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Wrap an existing identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh, random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Serializable unit persisted for each message in a thread.
///
/// `content_payload` holds the message's content items in an opaque serialized
/// form. Stores never look inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessageRecord {
    /// Role tag (system, user, assistant, tool, ...).
    pub role: String,
    /// Optional display name of the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Time the message was appended.
    pub timestamp: DateTime<Utc>,
    /// Serialized content sequence; `None` means no content items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_payload: Option<String>,
}

impl StoredMessageRecord {
    /// Create a record stamped with the current time.
    pub fn new(role: impl Into<String>, content_payload: Option<String>) -> Self {
        Self {
            role: role.into(),
            author_name: None,
            timestamp: Utc::now(),
            content_payload,
        }
    }

    /// Attach an author display name.
    pub fn with_author(mut self, author_name: impl Into<String>) -> Self {
        self.author_name = Some(author_name.into());
        self
    }

    /// True when the record carries no content payload.
    pub fn has_empty_payload(&self) -> bool {
        self.content_payload
            .as_deref()
            .is_none_or(|payload| payload.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::{StoredMessageRecord, ThreadId};
    use pretty_assertions::assert_eq;

    #[test]
    fn generated_thread_ids_are_distinct() {
        let a = ThreadId::generate();
        let b = ThreadId::generate();
        assert!(a != b);
        assert!(!a.is_blank());
        assert!(ThreadId::new("  ").is_blank());
    }

    #[test]
    fn record_serializes_without_optional_fields() {
        let record = StoredMessageRecord::new("user", None);
        let value = serde_json::to_value(&record).expect("serialize");
        assert!(value.get("author_name").is_none());
        assert!(value.get("content_payload").is_none());

        let parsed: StoredMessageRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(parsed, record);
        assert!(parsed.has_empty_payload());
    }

    #[test]
    fn thread_id_is_transparent_in_json() {
        let id = ThreadId::new("thread-1");
        assert_eq!(serde_json::to_string(&id).expect("json"), "\"thread-1\"");
    }
}
