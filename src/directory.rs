use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::common::{GroupConversation, Identity, RecentChat, UserProfile};
use crate::conversation::new_group_id;
use crate::storage::DirectoryStore;
use crate::sync::{SyncError, SyncResult};

/// Minimum number of users, besides the creator, a group is created with.
pub const MIN_GROUP_SELECTION: usize = 2;

/// User lookup, recent chats and group creation.
pub struct Directory<S> {
    store: Arc<S>,
}

impl<S: DirectoryStore> Directory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Makes `identity` findable by nickname.
    pub async fn register(&self, identity: &Identity) -> SyncResult<()> {
        self.store
            .upsert_user(&UserProfile {
                id: identity.user_id.clone(),
                nickname: identity.nickname.clone(),
            })
            .await?;
        Ok(())
    }

    /// Users whose nickname starts with `prefix`, without `exclude`.
    pub async fn search_users(&self, prefix: &str, exclude: &str) -> SyncResult<Vec<UserProfile>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let mut users = self.store.search_users(prefix).await?;
        users.retain(|user| user.id != exclude);
        Ok(users)
    }

    pub async fn recent_chats(&self, owner_id: &str) -> SyncResult<Vec<RecentChat>> {
        Ok(self.store.recent_chats(owner_id).await?)
    }

    /// Creates a group of `creator` and at least two `selected` users and
    /// lists it in every member's recent chats.
    pub async fn create_group(
        &self,
        creator: &Identity,
        selected: &[String],
        name: &str,
    ) -> SyncResult<GroupConversation> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::InvalidGroup("enter a group name".into()));
        }

        let others: BTreeSet<&str> = selected
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty() && *id != creator.user_id)
            .collect();
        if others.len() < MIN_GROUP_SELECTION {
            return Err(SyncError::InvalidGroup(format!(
                "select at least {MIN_GROUP_SELECTION} other users"
            )));
        }

        for id in &others {
            if self.store.user(id).await?.is_none() {
                return Err(SyncError::UnknownUser(id.to_string()));
            }
        }

        let created_at = Utc::now().timestamp_millis();
        let mut members: Vec<String> = others.into_iter().map(str::to_string).collect();
        members.push(creator.user_id.clone());

        let group = GroupConversation {
            id: new_group_id(created_at),
            group_name: name.to_string(),
            members,
            message_count: 0,
            created_at,
        };
        self.store.create_group(&group).await?;

        let entry = RecentChat {
            chat_id: group.id.clone(),
            nickname: group.group_name.clone(),
            last_message: String::new(),
            updated_at: created_at,
        };
        for member in &group.members {
            self.store.upsert_recent_chat(member, &entry).await?;
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    fn identity(user_id: &str) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            nickname: format!("nick-{user_id}"),
        }
    }

    async fn directory_with(ids: &[&str]) -> Directory<SqliteStore> {
        let directory = Directory::new(Arc::new(SqliteStore::in_memory().unwrap()));
        for id in ids {
            directory.register(&identity(id)).await.unwrap();
        }
        directory
    }

    #[tokio::test]
    async fn group_needs_two_others_and_a_name() {
        let directory = directory_with(&["U1", "U2", "U3"]).await;
        let creator = identity("U1");

        let err = directory
            .create_group(&creator, &["U2".into(), "U1".into()], "team")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidGroup(_)));

        let err = directory
            .create_group(&creator, &["U2".into(), "U3".into()], "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidGroup(_)));
    }

    #[tokio::test]
    async fn group_members_include_creator_once_and_see_it_in_recent_chats() {
        let directory = directory_with(&["U1", "U2", "U3"]).await;
        let creator = identity("U1");

        let group = directory
            .create_group(&creator, &["U2".into(), "U3".into(), "U2".into()], "team")
            .await
            .unwrap();
        assert!(group.id.starts_with("group_"));
        assert_eq!(group.members, vec!["U2", "U3", "U1"]);

        for member in ["U1", "U2", "U3"] {
            let chats = directory.recent_chats(member).await.unwrap();
            assert_eq!(chats.len(), 1);
            assert_eq!(chats[0].chat_id, group.id);
            assert_eq!(chats[0].nickname, "team");
        }
    }

    #[tokio::test]
    async fn unknown_members_are_rejected() {
        let directory = directory_with(&["U1", "U2"]).await;
        let err = directory
            .create_group(&identity("U1"), &["U2".into(), "ghost".into()], "team")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownUser(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn search_skips_blank_prefix_and_self() {
        let directory = directory_with(&["U1", "U2"]).await;
        assert!(directory.search_users("  ", "U1").await.unwrap().is_empty());

        let found = directory.search_users("nick", "U1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "U2");
    }
}
