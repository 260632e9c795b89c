use std::collections::{BTreeMap, HashMap};

use crate::common::{Message, MessageStatus, SortKey};
use crate::storage::MessageRecord;

/// Outcome of merging one message into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Inserted,
    Updated,
    Unchanged,
    Discarded,
}

/// Ordered window of the messages loaded for the active conversation.
///
/// Messages are keyed by [`SortKey`], so iteration is always ascending by
/// `(sequence, timestamp)`, and indexed by id, so no id appears twice.
#[derive(Debug, Default)]
pub struct MessageCache {
    ordered: BTreeMap<SortKey, Message>,
    keys: HashMap<String, SortKey>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the window with `page` (any order).
    pub fn initialize(&mut self, page: Vec<Message>) {
        self.clear();
        for message in page {
            self.append_or_update(message);
        }
    }

    /// Merges a page of older history, skipping ids already loaded.
    /// Returns whether anything new was added.
    pub fn prepend_older(&mut self, page: Vec<Message>) -> bool {
        let mut added = 0usize;
        for message in page {
            if !self.keys.contains_key(&message.id) {
                self.insert(message);
                added += 1;
            }
        }
        added > 0
    }

    /// Inserts `message`, or replaces the entry with the same id in place.
    /// Status never moves backwards: a stale `sent` copy of a message
    /// already `seen` keeps `seen`.
    pub fn append_or_update(&mut self, mut message: Message) -> Merge {
        let Some(key) = self.keys.get(&message.id).cloned() else {
            self.insert(message);
            return Merge::Inserted;
        };

        if let Some(existing) = self.ordered.get(&key) {
            message.status = message.status.max(existing.status);
            if *existing == message {
                return Merge::Unchanged;
            }
        }

        self.ordered.remove(&key);
        self.insert(message);
        Merge::Updated
    }

    /// Validates a raw store record and merges it. Malformed records are
    /// dropped and never reach the window.
    pub fn merge_record(&mut self, record: MessageRecord) -> Merge {
        match Message::try_from(record) {
            Ok(message) => self.append_or_update(message),
            Err(err) => {
                log::debug!("Discarding malformed record: {err}");
                Merge::Discarded
            }
        }
    }

    /// Marks a loaded message as seen. Returns false if the id is unknown.
    pub fn mark_seen(&mut self, message_id: &str) -> bool {
        let Some(key) = self.keys.get(message_id) else {
            return false;
        };
        match self.ordered.get_mut(key) {
            Some(message) => {
                message.status = MessageStatus::Seen;
                true
            }
            None => false,
        }
    }

    /// Messages in display order (oldest first).
    pub fn snapshot(&self) -> Vec<Message> {
        self.ordered.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.ordered.values()
    }

    /// Pagination cursor: key of the oldest loaded message.
    pub fn oldest(&self) -> Option<SortKey> {
        self.ordered.keys().next().cloned()
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.keys
            .get(message_id)
            .and_then(|key| self.ordered.get(key))
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn clear(&mut self) {
        self.ordered.clear();
        self.keys.clear();
    }

    fn insert(&mut self, message: Message) {
        let key = message.sort_key();
        self.keys.insert(message.id.clone(), key.clone());
        self.ordered.insert(key, message);
    }
}
