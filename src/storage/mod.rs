pub mod database;
pub mod error;
pub mod feed;
pub mod models;
pub mod sqlite_store;

pub use error::{Result, StoreError};
pub use feed::{ChangeRecord, Subscription};
pub use models::{MessageRecord, RecordError};
pub use sqlite_store::SqliteStore;

use std::fs;
use std::path::Path;

use async_trait::async_trait;

use crate::common::{
    GroupConversation, Message, MessageStatus, NewMessage, RecentChat, SortKey, UserProfile,
};
use crate::conversation::ConversationRef;

/// Message collections of direct and group conversations.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Creates a direct conversation document if it does not exist yet.
    /// Groups are never created here; a missing group is `NotFound`.
    async fn ensure_conversation(
        &self,
        conversation: &ConversationRef,
        participants: &[String],
    ) -> Result<()>;

    async fn participants(&self, conversation: &ConversationRef) -> Result<Vec<String>>;

    /// Newest-first page of messages strictly older than `cursor`, or the
    /// newest messages when no cursor is given.
    async fn fetch_page(
        &self,
        conversation: &ConversationRef,
        cursor: Option<&SortKey>,
        page_size: usize,
    ) -> Result<Vec<Message>>;

    /// Opens a live feed that first replays the latest `window` records.
    async fn subscribe_latest(
        &self,
        conversation: &ConversationRef,
        window: usize,
    ) -> Result<Subscription>;

    /// Persists a message with server-assigned id, timestamp and sequence.
    async fn append_message(
        &self,
        conversation: &ConversationRef,
        draft: NewMessage,
    ) -> Result<Message>;

    /// Raises the status of a message. Never lowers it.
    async fn update_status(
        &self,
        conversation: &ConversationRef,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<()>;
}

/// Users, groups and per-user recent chat lists.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn upsert_user(&self, profile: &UserProfile) -> Result<()>;
    async fn user(&self, user_id: &str) -> Result<Option<UserProfile>>;
    /// Users whose nickname starts with `prefix`, ordered by nickname.
    async fn search_users(&self, prefix: &str) -> Result<Vec<UserProfile>>;

    async fn create_group(&self, group: &GroupConversation) -> Result<()>;
    async fn group(&self, group_id: &str) -> Result<Option<GroupConversation>>;

    /// Inserts the entry or refreshes its nickname, keeping any preview.
    async fn upsert_recent_chat(&self, owner_id: &str, chat: &RecentChat) -> Result<()>;
    /// Updates the preview of an existing entry; missing entries are left alone.
    async fn touch_recent_chat(
        &self,
        owner_id: &str,
        chat_id: &str,
        last_message: &str,
        updated_at: i64,
    ) -> Result<()>;
    /// Newest first.
    async fn recent_chats(&self, owner_id: &str) -> Result<Vec<RecentChat>>;
}

/// Ensure the directory holding `path` exists
pub fn ensure_data_dir<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
