/// Actions the UI hands to the sync client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    /// Open a chat from its recent-chat id: a peer user id, or a group id
    /// (recognised by its prefix).
    OpenChat { chat_id: String },
    /// Create a group with the selected users and open it.
    CreateGroup { name: String, members: Vec<String> },
    /// The message list was scrolled to the top.
    LoadOlder,
    /// A message became visible on screen.
    MarkVisible { message_id: String },
    SendText(String),
    /// Send an attachment by reference (data URL, path or URL).
    SendFile(String),
    Close,
    SearchUsers { prefix: String },
    RecentChats,
}
