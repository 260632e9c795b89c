use crate::common::{Message, MessageBody, MessageStatus};

pub fn render_message(message: &Message, me: &str) -> String {
    let content = match &message.body {
        MessageBody::Text(text) => text.clone(),
        MessageBody::File(reference) => format!("[file] {reference}"),
    };
    let seen = if message.is_from(me) && message.status == MessageStatus::Seen {
        " (seen)"
    } else {
        ""
    };
    format!(
        "[{}] {}: {}{}",
        message.sequence, message.sender_nickname, content, seen
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outgoing_seen_messages_are_flagged() {
        let mut message = Message {
            id: "m1".into(),
            sender_id: "U1".into(),
            sender_nickname: "ann".into(),
            body: MessageBody::Text("hi".into()),
            timestamp: 1,
            sequence: 4,
            status: MessageStatus::Seen,
        };
        assert_eq!(render_message(&message, "U1"), "[4] ann: hi (seen)");
        assert_eq!(render_message(&message, "U2"), "[4] ann: hi");

        message.body = MessageBody::File("cat.png".into());
        message.status = MessageStatus::Sent;
        assert_eq!(render_message(&message, "U1"), "[4] ann: [file] cat.png");
    }
}
