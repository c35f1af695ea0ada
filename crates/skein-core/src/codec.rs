//! Translation between caller messages and stored records.
//!
//! Encoding is total. Decoding degrades: a payload that cannot be read turns
//! into an empty content sequence and a warning, never an error, so one bad
//! record cannot take a whole conversation down with it.

use crate::content::{ContentItem, HistoryMessage};
use chrono::Utc;
use log::warn;
use skein_store::StoredMessageRecord;
use thiserror::Error;

/// Failure to read a record's content payload.
#[derive(Debug, Error)]
#[error("failed to decode content payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Encode a message into a storable record.
///
/// The record timestamp is the message's `created_at`, or now when unset.
pub fn encode(message: &HistoryMessage) -> StoredMessageRecord {
    StoredMessageRecord {
        role: message.role.clone(),
        author_name: message.author_name.clone(),
        timestamp: message.created_at.unwrap_or_else(Utc::now),
        content_payload: encode_contents(&message.contents),
    }
}

/// Encode a batch of messages, preserving order.
pub fn encode_all(messages: &[HistoryMessage]) -> Vec<StoredMessageRecord> {
    messages.iter().map(encode).collect()
}

/// Decode a record, falling back to empty contents when the payload is bad.
pub fn decode(record: &StoredMessageRecord) -> HistoryMessage {
    let contents = match try_decode_contents(record) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(
                "dropping unreadable message content (role={}, timestamp={}, error={})",
                record.role, record.timestamp, err
            );
            Vec::new()
        }
    };
    HistoryMessage {
        role: record.role.clone(),
        author_name: record.author_name.clone(),
        created_at: Some(record.timestamp),
        contents,
    }
}

/// Decode every record independently.
pub fn decode_all(records: &[StoredMessageRecord]) -> Vec<HistoryMessage> {
    records.iter().map(decode).collect()
}

/// Decode a record's content payload, reporting malformed data.
pub fn try_decode_contents(record: &StoredMessageRecord) -> Result<Vec<ContentItem>, DecodeError> {
    if record.has_empty_payload() {
        return Ok(Vec::new());
    }
    let payload = record.content_payload.as_deref().unwrap_or_default();
    Ok(serde_json::from_str(payload)?)
}

fn encode_contents(contents: &[ContentItem]) -> Option<String> {
    if contents.is_empty() {
        return None;
    }
    match serde_json::to_string(contents) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(
                "failed to serialize message content (items={}, error={})",
                contents.len(),
                err
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, decode_all, encode, try_decode_contents};
    use crate::content::{ContentItem, HistoryMessage};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use skein_store::StoredMessageRecord;

    #[test]
    fn encode_preserves_items_and_author() {
        let message = HistoryMessage::new(
            "assistant",
            vec![
                ContentItem::text("let me check"),
                ContentItem::function_call("call_1", "Read", "{\"path\":\"a\"}"),
                ContentItem::function_result("call_1", "Read", "file body"),
            ],
        )
        .with_author("helper");

        let record = encode(&message);
        assert_eq!(record.role, "assistant");
        assert_eq!(record.author_name.as_deref(), Some("helper"));

        let decoded = decode(&record);
        assert_eq!(decoded.contents, message.contents);
        assert_eq!(decoded.created_at, Some(record.timestamp));
    }

    #[test]
    fn encode_keeps_existing_timestamp() {
        let created_at = Utc::now() - chrono::Duration::minutes(5);
        let mut message = HistoryMessage::user("hi");
        message.created_at = Some(created_at);
        assert_eq!(encode(&message).timestamp, created_at);
    }

    #[test]
    fn empty_contents_encode_to_no_payload() {
        let record = encode(&HistoryMessage::new("user", Vec::new()));
        assert_eq!(record.content_payload, None);
        assert!(decode(&record).contents.is_empty());
    }

    #[test]
    fn blank_payload_is_not_an_error() {
        let record = StoredMessageRecord::new("user", Some("   ".to_string()));
        assert_eq!(try_decode_contents(&record).expect("blank"), Vec::new());
    }

    #[test]
    fn malformed_payload_degrades_without_touching_neighbours() {
        let good = encode(&HistoryMessage::user("first"));
        let bad = StoredMessageRecord::new("assistant", Some("not valid json".to_string()))
            .with_author("bot");
        let also_good = encode(&HistoryMessage::user("third"));

        assert!(try_decode_contents(&bad).is_err());

        let decoded = decode_all(&[good, bad, also_good]);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].text_content(), "first");
        assert_eq!(decoded[1].role, "assistant");
        assert_eq!(decoded[1].author_name.as_deref(), Some("bot"));
        assert!(decoded[1].contents.is_empty());
        assert_eq!(decoded[2].text_content(), "third");
    }

    #[test]
    fn payload_of_wrong_shape_degrades() {
        let record = StoredMessageRecord::new("user", Some("{\"type\":\"text\"}".to_string()));
        assert!(decode(&record).contents.is_empty());
    }
}
