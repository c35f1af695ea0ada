//! Caller-facing message model with polymorphic content items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role tag for system prompts.
pub const ROLE_SYSTEM: &str = "system";
/// Role tag for user turns.
pub const ROLE_USER: &str = "user";
/// Role tag for assistant turns.
pub const ROLE_ASSISTANT: &str = "assistant";
/// Role tag for tool output.
pub const ROLE_TOOL: &str = "tool";

/// One item of a message's content sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Plain text.
    Text { text: String },
    /// Model reasoning text kept separate from the visible reply.
    Reasoning { text: String },
    /// A request to invoke a tool or function.
    FunctionCall {
        call_id: String,
        name: String,
        /// Raw argument payload, usually JSON text.
        arguments: String,
    },
    /// The outcome of a previous function call.
    FunctionResult {
        call_id: String,
        #[serde(default)]
        name: String,
        result: String,
    },
    /// Reference to external data such as an image URL.
    Uri {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    /// A content kind this build does not know about.
    #[serde(other)]
    Unknown,
}

impl ContentItem {
    /// Build a text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Build a function call item.
    pub fn function_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::FunctionCall {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Build a function result item.
    pub fn function_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self::FunctionResult {
            call_id: call_id.into(),
            name: name.into(),
            result: result.into(),
        }
    }
}

/// Message as seen by callers of the history cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryMessage {
    /// Role tag (see the `ROLE_*` constants; the set is open).
    pub role: String,
    /// Optional author display name.
    pub author_name: Option<String>,
    /// Append time. `None` for messages that have not been recorded yet.
    pub created_at: Option<DateTime<Utc>>,
    /// Ordered content items.
    pub contents: Vec<ContentItem>,
}

impl HistoryMessage {
    /// Create a message with the given role and content items.
    pub fn new(role: impl Into<String>, contents: Vec<ContentItem>) -> Self {
        Self {
            role: role.into(),
            author_name: None,
            created_at: None,
            contents,
        }
    }

    /// Create a single-text message.
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(role, vec![ContentItem::text(text)])
    }

    /// Create a user text message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(ROLE_USER, text)
    }

    /// Create an assistant text message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(ROLE_ASSISTANT, text)
    }

    /// Create a system text message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(ROLE_SYSTEM, text)
    }

    /// Attach an author display name.
    pub fn with_author(mut self, author_name: impl Into<String>) -> Self {
        self.author_name = Some(author_name.into());
        self
    }

    /// Concatenate every text item, separated by newlines.
    pub fn text_content(&self) -> String {
        let parts = self
            .contents
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>();
        parts.join("\n")
    }
}
