pub mod commands;
pub mod events;
pub mod types;

pub use commands::SyncCommand;
pub use events::SyncEvent;
pub use types::{
    GroupConversation, Identity, Message, MessageBody, MessageStatus, NewMessage,
    RecentChat, SortKey, UserProfile,
};
