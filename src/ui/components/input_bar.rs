use crate::common::SyncCommand;

/// What a line typed into the console asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Command(SyncCommand),
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "\
/dm <user_id>                 open a direct chat
/open <chat_id>               open a recent chat (user id or group id)
/group <name> <user_id>...    create a group with at least two users
/more                         load older messages
/file <reference>             send an attachment reference
/recent                       list recent chats
/search <nickname prefix>     find users
/close                        leave the current chat
/quit                         exit
anything else                 send as a text message";

/// Turns one input line into an action. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<InputAction> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Some(InputAction::Command(SyncCommand::SendText(line.to_string())));
    };

    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();

    let action = match (name, args) {
        ("help", _) => InputAction::Help,
        ("quit" | "exit", _) => InputAction::Quit,
        ("more", _) => InputAction::Command(SyncCommand::LoadOlder),
        ("close", _) => InputAction::Command(SyncCommand::Close),
        ("recent", _) => InputAction::Command(SyncCommand::RecentChats),
        ("dm" | "open", "") => InputAction::Invalid(format!("usage: /{name} <id>")),
        ("dm" | "open", chat_id) => InputAction::Command(SyncCommand::OpenChat {
            chat_id: chat_id.to_string(),
        }),
        ("search", prefix) => InputAction::Command(SyncCommand::SearchUsers {
            prefix: prefix.to_string(),
        }),
        ("file", "") => InputAction::Invalid("usage: /file <reference>".into()),
        ("file", reference) => InputAction::Command(SyncCommand::SendFile(reference.to_string())),
        ("group", args) => {
            let mut words = args.split_whitespace();
            match words.next() {
                Some(name) => InputAction::Command(SyncCommand::CreateGroup {
                    name: name.to_string(),
                    members: words.map(str::to_string).collect(),
                }),
                None => InputAction::Invalid("usage: /group <name> <user_id>...".into()),
            }
        }
        (other, _) => InputAction::Invalid(format!("unknown command /{other}, try /help")),
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_text_messages() {
        assert_eq!(
            parse("  hello there "),
            Some(InputAction::Command(SyncCommand::SendText("hello there".into())))
        );
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn slash_commands_map_to_sync_commands() {
        assert_eq!(
            parse("/dm U2"),
            Some(InputAction::Command(SyncCommand::OpenChat {
                chat_id: "U2".into()
            }))
        );
        assert_eq!(
            parse("/group team U2 U3"),
            Some(InputAction::Command(SyncCommand::CreateGroup {
                name: "team".into(),
                members: vec!["U2".into(), "U3".into()],
            }))
        );
        assert_eq!(parse("/more"), Some(InputAction::Command(SyncCommand::LoadOlder)));
        assert_eq!(parse("/quit"), Some(InputAction::Quit));
    }

    #[test]
    fn malformed_commands_are_reported() {
        assert!(matches!(parse("/dm"), Some(InputAction::Invalid(_))));
        assert!(matches!(parse("/file"), Some(InputAction::Invalid(_))));
        assert!(matches!(parse("/wallpaper blue"), Some(InputAction::Invalid(_))));
    }
}
