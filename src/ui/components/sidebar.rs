use crate::common::{RecentChat, UserProfile};

pub fn render_recent(chats: &[RecentChat]) -> Vec<String> {
    if chats.is_empty() {
        return vec!["No recent chats yet".to_string()];
    }

    chats
        .iter()
        .map(|chat| {
            if chat.last_message.is_empty() {
                format!("{} ({})", chat.nickname, chat.chat_id)
            } else {
                format!("{} ({}): {}", chat.nickname, chat.chat_id, chat.last_message)
            }
        })
        .collect()
}

pub fn render_users(users: &[UserProfile]) -> Vec<String> {
    if users.is_empty() {
        return vec!["No user found".to_string()];
    }

    users
        .iter()
        .map(|user| format!("{} ({})", user.nickname, user.id))
        .collect()
}
