use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The authenticated participant, as handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub nickname: String,
}

/// Delivery status of a message. Ordered: `Sent < Seen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Seen,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Seen => "seen",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sent" => Ok(MessageStatus::Sent),
            "seen" => Ok(MessageStatus::Seen),
            other => Err(format!("unknown message status `{other}`")),
        }
    }
}

/// Payload of a message: either text or an attached file reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MessageBody {
    Text(String),
    /// Opaque file reference (data URL, path or remote URL).
    File(String),
}

impl MessageBody {
    pub fn is_empty(&self) -> bool {
        match self {
            MessageBody::Text(text) => text.trim().is_empty(),
            MessageBody::File(reference) => reference.trim().is_empty(),
        }
    }

    /// Short text used for recent chat previews.
    pub fn preview(&self) -> &str {
        match self {
            MessageBody::Text(text) => text,
            MessageBody::File(_) => "File sent",
        }
    }
}

/// Position of a message within its conversation: sequence count first,
/// then server timestamp, then id so that the order is total.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub sequence: u64,
    pub timestamp: i64,
    pub id: String,
}

/// Domain model of a persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub sender_nickname: String,
    pub body: MessageBody,
    pub timestamp: i64,
    pub sequence: u64,
    pub status: MessageStatus,
}

impl Message {
    pub fn sort_key(&self) -> SortKey {
        SortKey {
            sequence: self.sequence,
            timestamp: self.timestamp,
            id: self.id.clone(),
        }
    }

    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// A message before the store has assigned id, timestamp and sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: String,
    pub sender_nickname: String,
    pub body: MessageBody,
}

/// Group conversation document. Membership never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConversation {
    pub id: String,
    pub group_name: String,
    pub members: Vec<String>,
    pub message_count: u64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub nickname: String,
}

/// Entry of a user's recent chats list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentChat {
    /// Peer user id for direct chats, group id for groups.
    pub chat_id: String,
    pub nickname: String,
    pub last_message: String,
    pub updated_at: i64,
}
