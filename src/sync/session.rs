use crate::common::Message;
use crate::conversation::ConversationRef;
use crate::storage::Subscription;

use super::cache::MessageCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Live,
    LoadingMore,
    Closed,
}

/// Everything the engine knows about the conversation on screen.
/// Dropped or closed as a whole when the user switches away.
pub struct ConversationSession {
    conversation: ConversationRef,
    title: String,
    state: SessionState,
    cache: MessageCache,
    subscription: Option<Subscription>,
    history_exhausted: bool,
}

impl ConversationSession {
    pub fn new(conversation: ConversationRef, title: String) -> Self {
        Self {
            conversation,
            title,
            state: SessionState::Loading,
            cache: MessageCache::new(),
            subscription: None,
            history_exhausted: false,
        }
    }

    pub fn conversation(&self) -> &ConversationRef {
        &self.conversation
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Live | SessionState::LoadingMore)
    }

    /// Whether a delivery tagged with `conversation` belongs here.
    pub fn accepts(&self, conversation: &ConversationRef) -> bool {
        self.is_active() && &self.conversation == conversation
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut MessageCache {
        &mut self.cache
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.cache.snapshot()
    }

    pub fn history_exhausted(&self) -> bool {
        self.history_exhausted
    }

    pub(crate) fn mark_history_exhausted(&mut self) {
        self.history_exhausted = true;
    }

    pub(crate) fn subscription_mut(&mut self) -> Option<&mut Subscription> {
        self.subscription.as_mut()
    }

    pub(crate) fn drop_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    /// Loading -> Live with the first page and the live feed in place.
    pub(crate) fn go_live(&mut self, page: Vec<Message>, subscription: Subscription) {
        self.cache.initialize(page);
        self.subscription = Some(subscription);
        self.state = SessionState::Live;
    }

    /// Cancels the feed and forgets the window and pagination state.
    pub(crate) fn close(&mut self) {
        self.drop_subscription();
        self.cache.clear();
        self.history_exhausted = false;
        self.state = SessionState::Closed;
    }
}
