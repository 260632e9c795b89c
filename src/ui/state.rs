use std::collections::{HashMap, HashSet};

use crate::common::{Message, MessageStatus, SyncEvent};
use crate::conversation::ConversationRef;

use super::components::{chat_area, sidebar};

/// Output of applying one event: lines to print, and incoming messages
/// that just became visible and should be acknowledged.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Rendered {
    pub lines: Vec<String>,
    pub visible: Vec<String>,
}

/// Local state of the console UI.
pub struct AppState {
    me: String,
    pub conversation: Option<ConversationRef>,
    pub title: Option<String>,
    /// Message id -> status as last printed.
    printed: HashMap<String, MessageStatus>,
    reported_visible: HashSet<String>,
}

impl AppState {
    pub fn new(me: String) -> Self {
        Self {
            me,
            conversation: None,
            title: None,
            printed: HashMap::new(),
            reported_visible: HashSet::new(),
        }
    }

    fn reset_conversation(&mut self, conversation: Option<ConversationRef>, title: Option<String>) {
        self.conversation = conversation;
        self.title = title;
        self.printed.clear();
        self.reported_visible.clear();
    }

    pub fn apply(&mut self, event: SyncEvent) -> Rendered {
        let mut rendered = Rendered::default();
        match event {
            SyncEvent::Opened {
                conversation,
                title,
            } => {
                rendered.lines.push(format!("=== Chat with {title} ==="));
                self.reset_conversation(Some(conversation), Some(title));
            }
            SyncEvent::Snapshot {
                conversation,
                messages,
            } => {
                if self.conversation.as_ref() == Some(&conversation) {
                    self.render_snapshot(&messages, &mut rendered);
                }
            }
            SyncEvent::HistoryExhausted(_) => {
                rendered.lines.push("--- beginning of conversation ---".into());
            }
            SyncEvent::GroupCreated(group) => {
                rendered.lines.push(format!(
                    "Group {} created with {} members",
                    group.group_name,
                    group.members.len()
                ));
            }
            SyncEvent::SearchResults(users) => rendered.lines = sidebar::render_users(&users),
            SyncEvent::RecentChats(chats) => rendered.lines = sidebar::render_recent(&chats),
            SyncEvent::Closed => {
                rendered.lines.push("Chat closed".into());
                self.reset_conversation(None, None);
            }
            SyncEvent::Error(message) => rendered.lines.push(format!("! {message}")),
        }
        rendered
    }

    /// Prints only what changed since the previous snapshot.
    fn render_snapshot(&mut self, messages: &[Message], rendered: &mut Rendered) {
        for message in messages {
            let changed = self.printed.get(&message.id) != Some(&message.status);
            if changed {
                rendered
                    .lines
                    .push(chat_area::render_message(message, &self.me));
                self.printed.insert(message.id.clone(), message.status);
            }

            let unseen_incoming =
                !message.is_from(&self.me) && message.status < MessageStatus::Seen;
            if unseen_incoming && self.reported_visible.insert(message.id.clone()) {
                rendered.visible.push(message.id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MessageBody;

    fn message(id: &str, sender: &str, sequence: u64) -> Message {
        Message {
            id: id.into(),
            sender_id: sender.into(),
            sender_nickname: sender.to_lowercase(),
            body: MessageBody::Text(format!("msg {id}")),
            timestamp: sequence as i64,
            sequence,
            status: MessageStatus::Sent,
        }
    }

    #[test]
    fn snapshots_print_new_lines_and_report_incoming_once() {
        let conversation = ConversationRef::direct("U1", "U2");
        let mut state = AppState::new("U1".into());
        state.apply(SyncEvent::Opened {
            conversation: conversation.clone(),
            title: "u2".into(),
        });

        let first = vec![message("a", "U1", 1), message("b", "U2", 2)];
        let rendered = state.apply(SyncEvent::Snapshot {
            conversation: conversation.clone(),
            messages: first.clone(),
        });
        assert_eq!(rendered.lines.len(), 2);
        assert_eq!(rendered.visible, vec!["b".to_string()]);

        let rendered = state.apply(SyncEvent::Snapshot {
            conversation: conversation.clone(),
            messages: first,
        });
        assert_eq!(rendered, Rendered::default());
    }

    #[test]
    fn snapshots_of_other_conversations_are_ignored() {
        let mut state = AppState::new("U1".into());
        state.apply(SyncEvent::Opened {
            conversation: ConversationRef::direct("U1", "U2"),
            title: "u2".into(),
        });
        let rendered = state.apply(SyncEvent::Snapshot {
            conversation: ConversationRef::direct("U1", "U3"),
            messages: vec![message("x", "U3", 1)],
        });
        assert!(rendered.lines.is_empty());
    }
}
