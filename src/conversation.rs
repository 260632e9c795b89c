use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix carried by every group conversation id.
pub const GROUP_PREFIX: &str = "group_";

/// Canonical id of the direct conversation between two users.
///
/// The two ids are sorted lexicographically and joined with `_`, so the
/// result does not depend on argument order.
pub fn conversation_id(a: &str, b: &str) -> String {
    if a < b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

/// Time-based id for a newly created group.
pub fn new_group_id(created_at_millis: i64) -> String {
    format!("{GROUP_PREFIX}{created_at_millis}")
}

/// Collection family a conversation lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Conversations,
    Groups,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Conversations => "conversations",
            Namespace::Groups => "groups",
        }
    }
}

/// Reference to either a direct or a group conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationRef {
    Direct(String),
    Group(String),
}

impl ConversationRef {
    /// Picks the namespace from the id: group ids carry [`GROUP_PREFIX`].
    pub fn parse(id: &str) -> Self {
        if id.starts_with(GROUP_PREFIX) {
            ConversationRef::Group(id.to_string())
        } else {
            ConversationRef::Direct(id.to_string())
        }
    }

    pub fn direct(a: &str, b: &str) -> Self {
        ConversationRef::Direct(conversation_id(a, b))
    }

    pub fn id(&self) -> &str {
        match self {
            ConversationRef::Direct(id) | ConversationRef::Group(id) => id,
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            ConversationRef::Direct(_) => Namespace::Conversations,
            ConversationRef::Group(_) => Namespace::Groups,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ConversationRef::Group(_))
    }
}

impl fmt::Display for ConversationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace().as_str(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_is_symmetric() {
        let pairs = [("U1", "U2"), ("alice", "bob"), ("z", "a"), ("same", "same"), ("", "x")];
        for (a, b) in pairs {
            assert_eq!(conversation_id(a, b), conversation_id(b, a));
        }
    }

    #[test]
    fn conversation_id_joins_in_lexicographic_order() {
        assert_eq!(conversation_id("U1", "U2"), "U1_U2");
        assert_eq!(conversation_id("U2", "U1"), "U1_U2");
    }

    #[test]
    fn group_prefix_selects_group_namespace() {
        let group = ConversationRef::parse(&new_group_id(1_700_000_000_000));
        assert_eq!(group, ConversationRef::Group("group_1700000000000".into()));
        assert_eq!(group.namespace(), Namespace::Groups);

        let direct = ConversationRef::parse("U1_U2");
        assert_eq!(direct.namespace(), Namespace::Conversations);
        assert_eq!(direct.to_string(), "conversations/U1_U2");
    }
}
