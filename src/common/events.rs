use crate::conversation::ConversationRef;

use super::types::{GroupConversation, Message, RecentChat, UserProfile};

/// Events sent from the sync client up to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Opened {
        conversation: ConversationRef,
        title: String,
    },
    /// Full window of the active conversation, oldest first.
    Snapshot {
        conversation: ConversationRef,
        messages: Vec<Message>,
    },
    /// Scrolling further up will not load anything.
    HistoryExhausted(ConversationRef),
    GroupCreated(GroupConversation),
    SearchResults(Vec<UserProfile>),
    RecentChats(Vec<RecentChat>),
    Closed,
    /// User-visible failure text.
    Error(String),
}
