use std::sync::Arc;

use chrono::Utc;

use crate::common::{
    Identity, Message, MessageBody, MessageStatus, NewMessage, RecentChat, UserProfile,
};
use crate::config::SyncConfig;
use crate::conversation::ConversationRef;
use crate::storage::{ChangeRecord, DirectoryStore, MessageStore, StoreError};

use super::cache::Merge;
use super::error::{SyncError, SyncResult};
use super::session::{ConversationSession, SessionState};

/// Drives the conversation on screen: first page, live feed, backward
/// pagination, sending and seen acknowledgements.
///
/// The engine owns at most one [`ConversationSession`]. Opening another
/// conversation closes the previous session only once the new one loaded.
pub struct SyncEngine<S> {
    store: Arc<S>,
    identity: Identity,
    config: SyncConfig,
    session: Option<ConversationSession>,
}

impl<S> SyncEngine<S>
where
    S: MessageStore + DirectoryStore,
{
    pub fn new(store: Arc<S>, identity: Identity, config: SyncConfig) -> Self {
        Self {
            store,
            identity,
            config,
            session: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, ConversationSession::state)
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        self.session.as_ref()
    }

    fn active_session(&self) -> Option<&ConversationSession> {
        self.session.as_ref().filter(|session| session.is_active())
    }

    pub fn active_conversation(&self) -> Option<&ConversationRef> {
        self.active_session().map(ConversationSession::conversation)
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.active_session()
            .map(ConversationSession::snapshot)
            .unwrap_or_default()
    }

    pub fn history_exhausted(&self) -> bool {
        self.active_session()
            .is_some_and(ConversationSession::history_exhausted)
    }

    /// Loaded incoming messages not yet acknowledged as seen.
    pub fn unseen_incoming(&self) -> Vec<String> {
        let Some(session) = self.active_session() else {
            return Vec::new();
        };
        session
            .cache()
            .iter()
            .filter(|message| {
                !message.is_from(&self.identity.user_id) && message.status < MessageStatus::Seen
            })
            .map(|message| message.id.clone())
            .collect()
    }

    /// Opens a chat by recent-chat id: group ids by prefix, anything else
    /// is the peer of a direct conversation.
    pub async fn open_chat(&mut self, chat_id: &str) -> SyncResult<ConversationRef> {
        match ConversationRef::parse(chat_id) {
            ConversationRef::Group(group_id) => self.open_group(&group_id).await,
            ConversationRef::Direct(peer_id) => self.open_direct(&peer_id).await,
        }
    }

    /// Opens the direct conversation with `peer_id`, creating it on first
    /// contact and listing it in both users' recent chats.
    pub async fn open_direct(&mut self, peer_id: &str) -> SyncResult<ConversationRef> {
        let peer = self
            .store
            .user(peer_id)
            .await?
            .ok_or_else(|| SyncError::UnknownUser(peer_id.to_string()))?;

        let me = &self.identity;
        let conversation = ConversationRef::direct(&me.user_id, &peer.id);
        self.store
            .ensure_conversation(&conversation, &[me.user_id.clone(), peer.id.clone()])
            .await?;

        self.select(conversation.clone(), peer.nickname.clone())
            .await?;

        // The session is live by now; a listing failure leaves it open.
        if let Err(err) = self.list_in_recent_chats(&peer).await {
            log::warn!("Failed to update recent chats for {conversation}: {err}");
        }
        Ok(conversation)
    }

    async fn list_in_recent_chats(&self, peer: &UserProfile) -> SyncResult<()> {
        let now = Utc::now().timestamp_millis();
        let me = &self.identity;
        self.store
            .upsert_recent_chat(
                &me.user_id,
                &RecentChat {
                    chat_id: peer.id.clone(),
                    nickname: peer.nickname.clone(),
                    last_message: String::new(),
                    updated_at: now,
                },
            )
            .await?;
        self.store
            .upsert_recent_chat(
                &peer.id,
                &RecentChat {
                    chat_id: me.user_id.clone(),
                    nickname: me.nickname.clone(),
                    last_message: String::new(),
                    updated_at: now,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn open_group(&mut self, group_id: &str) -> SyncResult<ConversationRef> {
        let group = self
            .store
            .group(group_id)
            .await?
            .ok_or_else(|| SyncError::UnknownGroup(group_id.to_string()))?;

        let conversation = ConversationRef::Group(group.id);
        self.select(conversation.clone(), group.group_name).await?;
        Ok(conversation)
    }

    /// Idle/Closed/Live -> Loading -> Live on `conversation`. On failure
    /// the previous session is left exactly as it was.
    async fn select(&mut self, conversation: ConversationRef, title: String) -> SyncResult<()> {
        let mut pending = ConversationSession::new(conversation.clone(), title);
        log::info!("Loading {conversation}");

        // Subscribe before reading so appends made during the read reach the feed.
        let subscription = self
            .store
            .subscribe_latest(&conversation, self.config.live_window)
            .await?;
        let page = self
            .store
            .fetch_page(&conversation, None, self.config.page_size)
            .await?;

        self.close();
        pending.go_live(page, subscription);
        log::info!(
            "{conversation} is live with {} messages",
            pending.cache().len()
        );
        self.session = Some(pending);
        self.acknowledge_loaded().await;
        Ok(())
    }

    /// Without the visibility gate, everything loaded counts as seen.
    async fn acknowledge_loaded(&mut self) {
        if self.config.require_visibility {
            return;
        }
        for message_id in self.unseen_incoming() {
            if let Err(err) = self.acknowledge(&message_id).await {
                log::warn!("Failed to mark {message_id} as seen: {err}");
            }
        }
    }

    /// Waits for the next live change of the active conversation. Pends
    /// forever while there is nothing to listen to.
    pub async fn next_delivery(&mut self) -> Option<ChangeRecord> {
        let Some(session) = self.session.as_mut().filter(|session| session.is_active()) else {
            return std::future::pending().await;
        };
        let Some(subscription) = session.subscription_mut() else {
            return std::future::pending().await;
        };

        let change = subscription.next().await;
        if change.is_none() {
            log::warn!("Live feed of {} ended", session.conversation());
            session.drop_subscription();
        }
        change
    }

    /// Merges one live delivery into the window. Deliveries tagged with any
    /// conversation but the active one are dropped.
    pub async fn handle_delivery(&mut self, change: ChangeRecord) -> SyncResult<Merge> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.accepts(&change.conversation))
        else {
            log::debug!(
                "Dropping delivery {} for inactive {}",
                change.record.id,
                change.conversation
            );
            return Ok(Merge::Discarded);
        };

        let message_id = change.record.id.clone();
        let merge = session.cache_mut().merge_record(change.record);
        if merge == Merge::Discarded {
            return Ok(merge);
        }

        if !self.config.require_visibility {
            self.acknowledge(&message_id).await?;
        }
        Ok(merge)
    }

    /// Called by the UI when `message_id` is on screen. Marks it seen if it
    /// is an incoming message that is not seen yet.
    pub async fn mark_visible(&mut self, message_id: &str) -> SyncResult<bool> {
        self.acknowledge(message_id).await
    }

    async fn acknowledge(&mut self, message_id: &str) -> SyncResult<bool> {
        let Some(session) = self.session.as_mut().filter(|session| session.is_active()) else {
            return Ok(false);
        };
        let Some(message) = session.cache().get(message_id) else {
            return Ok(false);
        };
        if message.is_from(&self.identity.user_id) || message.status >= MessageStatus::Seen {
            return Ok(false);
        }

        let conversation = session.conversation().clone();
        self.store
            .update_status(&conversation, message_id, MessageStatus::Seen)
            .await?;
        session.cache_mut().mark_seen(message_id);
        log::debug!("Marked {message_id} in {conversation} as seen");
        Ok(true)
    }

    /// Scroll-to-top: loads the page before the oldest loaded message.
    /// Returns whether new messages were added. Once a page comes back
    /// empty no further store calls are made for this session.
    pub async fn load_older(&mut self) -> SyncResult<bool> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.state() == SessionState::Live)
        else {
            return Ok(false);
        };
        if session.history_exhausted() {
            return Ok(false);
        }
        let Some(cursor) = session.cache().oldest() else {
            // Nothing loaded: everything later arrives through the feed.
            session.mark_history_exhausted();
            return Ok(false);
        };

        session.set_state(SessionState::LoadingMore);
        let conversation = session.conversation().clone();
        let page = self
            .store
            .fetch_page(&conversation, Some(&cursor), self.config.page_size)
            .await;
        session.set_state(SessionState::Live);

        let page = page?;
        if page.is_empty() {
            log::info!("Reached the beginning of {conversation}");
            session.mark_history_exhausted();
            return Ok(false);
        }
        let added = session.cache_mut().prepend_older(page);
        if added {
            self.acknowledge_loaded().await;
        }
        Ok(added)
    }

    /// Persists a message in the active conversation and shows it at once.
    pub async fn send(&mut self, body: MessageBody) -> SyncResult<Message> {
        let Some(session) = self.active_session() else {
            return Err(SyncError::NoConversationSelected);
        };
        if body.is_empty() {
            return Err(SyncError::EmptyMessage);
        }

        let conversation = session.conversation().clone();
        let body = match body {
            MessageBody::Text(text) => MessageBody::Text(text.trim().to_string()),
            file => file,
        };
        let draft = NewMessage {
            sender_id: self.identity.user_id.clone(),
            sender_nickname: self.identity.nickname.clone(),
            body,
        };

        let message = match self.store.append_message(&conversation, draft).await {
            Ok(message) => message,
            Err(StoreError::WriteConflict { message }) => {
                log::warn!(
                    "Sent {} to {conversation} with a contended sequence {}",
                    message.id,
                    message.sequence
                );
                *message
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.accepts(&conversation))
        {
            session.cache_mut().append_or_update(message.clone());
        }

        if let Err(err) = self.update_previews(&conversation, &message).await {
            log::warn!("Failed to update recent chats for {conversation}: {err}");
        }
        Ok(message)
    }

    async fn update_previews(
        &self,
        conversation: &ConversationRef,
        message: &Message,
    ) -> SyncResult<()> {
        let participants = self.store.participants(conversation).await?;
        let preview = message.body.preview();

        for owner in &participants {
            let chat_id = match conversation {
                ConversationRef::Group(id) => id.as_str(),
                ConversationRef::Direct(_) => participants
                    .iter()
                    .find(|participant| *participant != owner)
                    .unwrap_or(owner)
                    .as_str(),
            };
            self.store
                .touch_recent_chat(owner, chat_id, preview, message.timestamp)
                .await?;
        }
        Ok(())
    }

    /// Cancels the live feed and forgets the window and cursor.
    pub fn close(&mut self) {
        if let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.state() != SessionState::Closed)
        {
            session.close();
            log::info!("Closed {}", session.conversation());
        }
    }
}
