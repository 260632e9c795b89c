//! Message synchronisation core of a document-store backed chat client:
//! paginated history, live append with de-duplication, and seen-status
//! propagation for direct and group conversations.

pub mod common;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod storage;
pub mod sync;
pub mod ui;

pub use common::{Identity, Message, MessageBody, MessageStatus, SyncCommand, SyncEvent};
pub use conversation::{ConversationRef, conversation_id};
pub use storage::{DirectoryStore, MessageStore, SqliteStore};
pub use sync::{MessageCache, SyncClient, SyncEngine, SyncError};
