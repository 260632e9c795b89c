use thiserror::Error;

use crate::common::Message;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The conversation counter moved between read and increment. The
    /// message is already persisted, possibly sharing its sequence count.
    #[error("message count of conversation changed concurrently (message {} persisted)", .message.id)]
    WriteConflict { message: Box<Message> },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
