use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::{Message, MessageBody, MessageStatus};

/// Message document as it sits in the store. Every field may be missing;
/// [`Message::try_from`] is the only way into the domain model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub sender_id: Option<String>,
    pub sender_nickname: Option<String>,
    pub text: Option<String>,
    pub file: Option<String>,
    pub timestamp: Option<i64>,
    pub count: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record {0} has no sender")]
    MissingSender(String),
    #[error("record {0} has neither text nor file")]
    MissingBody(String),
    #[error("record {0} has no timestamp")]
    MissingTimestamp(String),
    #[error("record {id}: {reason}")]
    InvalidStatus { id: String, reason: String },
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl TryFrom<MessageRecord> for Message {
    type Error = RecordError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let MessageRecord {
            id,
            sender_id,
            sender_nickname,
            text,
            file,
            timestamp,
            count,
            status,
        } = record;

        let Some(sender_id) = non_empty(sender_id) else {
            return Err(RecordError::MissingSender(id));
        };

        // A file wins over text when a record carries both.
        let body = match (non_empty(file), non_empty(text)) {
            (Some(file), _) => MessageBody::File(file),
            (None, Some(text)) => MessageBody::Text(text),
            (None, None) => return Err(RecordError::MissingBody(id)),
        };

        let Some(timestamp) = timestamp else {
            return Err(RecordError::MissingTimestamp(id));
        };

        let status = match status {
            None => MessageStatus::Sent,
            Some(raw) => raw
                .parse()
                .map_err(|reason| RecordError::InvalidStatus { id: id.clone(), reason })?,
        };

        Ok(Message {
            sender_nickname: non_empty(sender_nickname).unwrap_or_else(|| sender_id.clone()),
            sender_id,
            body,
            timestamp,
            sequence: count.unwrap_or(0).max(0) as u64,
            status,
            id,
        })
    }
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        let (text, file) = match &message.body {
            MessageBody::Text(text) => (Some(text.clone()), None),
            MessageBody::File(file) => (None, Some(file.clone())),
        };

        Self {
            id: message.id.clone(),
            sender_id: Some(message.sender_id.clone()),
            sender_nickname: Some(message.sender_nickname.clone()),
            text,
            file,
            timestamp: Some(message.timestamp),
            count: Some(message.sequence as i64),
            status: Some(message.status.as_str().to_string()),
        }
    }
}
