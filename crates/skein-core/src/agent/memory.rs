//! AutoAgents memory adapter backed by a skein history cache.
//!
//! `remember` is the append hook run after each turn and `recall` the read
//! hook run before one. Neither flushes on its own unless
//! `flush_after_assistant` is enabled; durability cadence stays with the
//! caller.

use crate::codec;
use crate::content::{ContentItem, HistoryMessage};
use crate::history::ConversationHistory;
use autoagents_core::agent::memory::{MemoryProvider as AutoAgentsMemoryProvider, MemoryType};
use autoagents_llm::chat::{ChatMessage, ChatRole, MessageType};
use autoagents_llm::error::LLMError;
use autoagents_llm::{FunctionCall, ToolCall};
use log::{debug, warn};
use std::sync::Arc;

const FUNCTION_CALL_TYPE: &str = "function";

/// AutoAgents memory provider that reads and writes through a history cache.
#[derive(Clone)]
pub struct HistoryMemoryAdapter {
    history: Arc<dyn ConversationHistory>,
    recall_limit: Option<usize>,
    flush_after_assistant: bool,
}

impl HistoryMemoryAdapter {
    /// Wrap a history cache or fork.
    pub fn new(history: Arc<dyn ConversationHistory>) -> Self {
        Self {
            history,
            recall_limit: None,
            flush_after_assistant: false,
        }
    }

    /// Limit recall to the most recent `limit` messages by default.
    pub fn with_recall_limit(mut self, limit: Option<usize>) -> Self {
        self.recall_limit = limit.filter(|limit| *limit > 0);
        self
    }

    /// Flush after every assistant text reply.
    pub fn with_flush_after_assistant(mut self, enabled: bool) -> Self {
        self.flush_after_assistant = enabled;
        self
    }

    /// History this adapter writes to.
    pub fn history(&self) -> &Arc<dyn ConversationHistory> {
        &self.history
    }

    async fn flush_if_turn_complete(&self, message: &ChatMessage) {
        if !self.flush_after_assistant {
            return;
        }
        if matches!(message.role, ChatRole::Assistant)
            && matches!(message.message_type, MessageType::Text)
            && let Err(err) = self.history.flush().await
        {
            warn!(
                "turn flush failed; records stay pending (thread_id={}, error={})",
                self.history.thread_id(),
                err
            );
        }
    }
}

#[async_trait::async_trait]
impl AutoAgentsMemoryProvider for HistoryMemoryAdapter {
    async fn remember(&mut self, message: &ChatMessage) -> Result<(), LLMError> {
        let record = codec::encode(&chat_message_to_history(message));
        debug!(
            "remembering message (thread_id={}, role={})",
            self.history.thread_id(),
            record.role
        );
        self.history.append(vec![record]);
        self.flush_if_turn_complete(message).await;
        Ok(())
    }

    async fn recall(
        &self,
        _query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, LLMError> {
        let messages = self.history.read_merged().await;
        let limit = limit.filter(|limit| *limit > 0).or(self.recall_limit);
        let start = limit.map_or(0, |limit| messages.len().saturating_sub(limit));
        Ok(messages[start..]
            .iter()
            .map(history_to_chat_message)
            .collect())
    }

    async fn clear(&mut self) -> Result<(), LLMError> {
        self.history
            .replace_and_reset(Vec::new())
            .await
            .map_err(|err| LLMError::ProviderError(err.to_string()))
    }

    fn memory_type(&self) -> MemoryType {
        MemoryType::SlidingWindow
    }

    fn size(&self) -> usize {
        self.history.known_len()
    }

    fn clone_box(&self) -> Box<dyn AutoAgentsMemoryProvider> {
        Box::new(self.clone())
    }

    fn id(&self) -> Option<String> {
        Some(format!("skein:{}", self.history.thread_id()))
    }
}

/// Convert a framework chat message into a history message.
///
/// Binary attachments are not carried; only their accompanying text is kept.
pub fn chat_message_to_history(message: &ChatMessage) -> HistoryMessage {
    let mut contents = Vec::new();
    match &message.message_type {
        MessageType::ToolUse(calls) => {
            push_text(&mut contents, &message.content);
            contents.extend(calls.iter().map(|call| {
                ContentItem::function_call(
                    call.id.clone(),
                    call.function.name.clone(),
                    call.function.arguments.clone(),
                )
            }));
        }
        MessageType::ToolResult(calls) => {
            contents.extend(calls.iter().map(|call| {
                ContentItem::function_result(
                    call.id.clone(),
                    call.function.name.clone(),
                    call.function.arguments.clone(),
                )
            }));
        }
        _ => push_text(&mut contents, &message.content),
    }
    HistoryMessage::new(message.role.to_string(), contents)
}

/// Convert a history message back into a framework chat message.
pub fn history_to_chat_message(message: &HistoryMessage) -> ChatMessage {
    let mut calls = Vec::new();
    let mut results = Vec::new();
    for item in &message.contents {
        match item {
            ContentItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => calls.push(tool_call(call_id, name, arguments)),
            ContentItem::FunctionResult {
                call_id,
                name,
                result,
            } => results.push(tool_call(call_id, name, result)),
            _ => {}
        }
    }

    let role = role_from_str(&message.role);
    if !results.is_empty() {
        return ChatMessage {
            role,
            message_type: MessageType::ToolResult(results),
            content: String::new(),
        };
    }
    let message_type = if calls.is_empty() {
        MessageType::Text
    } else {
        MessageType::ToolUse(calls)
    };
    ChatMessage {
        role,
        message_type,
        content: message.text_content(),
    }
}

fn push_text(contents: &mut Vec<ContentItem>, text: &str) {
    if !text.is_empty() {
        contents.push(ContentItem::text(text));
    }
}

fn tool_call(call_id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: call_id.to_string(),
        call_type: FUNCTION_CALL_TYPE.to_string(),
        function: FunctionCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        },
    }
}

fn role_from_str(value: &str) -> ChatRole {
    match value {
        "system" => ChatRole::System,
        "assistant" => ChatRole::Assistant,
        "tool" => ChatRole::Tool,
        _ => ChatRole::User,
    }
}
