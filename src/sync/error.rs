use thiserror::Error;

use crate::storage::StoreError;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("select a conversation first")]
    NoConversationSelected,

    #[error("message is empty")]
    EmptyMessage,

    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("unknown group {0}")]
    UnknownGroup(String),

    #[error("invalid group: {0}")]
    InvalidGroup(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
