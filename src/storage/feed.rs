use std::collections::VecDeque;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::conversation::ConversationRef;

use super::models::MessageRecord;

/// One entry of the store's change feed: a message document was added or
/// modified in `conversation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub conversation: ConversationRef,
    pub record: MessageRecord,
}

/// Handle on a live subscription to one conversation.
///
/// Yields the initial backlog first, then every change published for the
/// conversation until [`Subscription::cancel`] is called.
pub struct Subscription {
    conversation: ConversationRef,
    backlog: VecDeque<MessageRecord>,
    receiver: Option<broadcast::Receiver<ChangeRecord>>,
}

impl Subscription {
    pub fn new(
        conversation: ConversationRef,
        backlog: Vec<MessageRecord>,
        receiver: broadcast::Receiver<ChangeRecord>,
    ) -> Self {
        Self {
            conversation,
            backlog: backlog.into(),
            receiver: Some(receiver),
        }
    }

    pub fn conversation(&self) -> &ConversationRef {
        &self.conversation
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.is_none()
    }

    /// Stops delivery. Anything still buffered is dropped.
    pub fn cancel(&mut self) {
        if self.receiver.take().is_some() {
            log::debug!("Subscription to {} cancelled", self.conversation);
        }
        self.backlog.clear();
    }

    /// Waits for the next change of this conversation. Returns `None` once
    /// cancelled or when the store has gone away.
    pub async fn next(&mut self) -> Option<ChangeRecord> {
        if let Some(record) = self.backlog.pop_front() {
            return Some(ChangeRecord {
                conversation: self.conversation.clone(),
                record,
            });
        }

        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(change) if change.conversation == self.conversation => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "Subscription to {} lagged, {skipped} changes skipped",
                        self.conversation
                    );
                }
                Err(RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn backlog_comes_first_then_matching_changes() {
        let (sender, receiver) = broadcast::channel(16);
        let target = ConversationRef::Direct("a_b".into());
        let mut subscription = Subscription::new(target.clone(), vec![record("old")], receiver);

        sender
            .send(ChangeRecord {
                conversation: ConversationRef::Direct("a_c".into()),
                record: record("other"),
            })
            .unwrap();
        sender
            .send(ChangeRecord {
                conversation: target.clone(),
                record: record("new"),
            })
            .unwrap();

        assert_eq!(subscription.next().await.unwrap().record.id, "old");
        assert_eq!(subscription.next().await.unwrap().record.id, "new");
    }

    #[tokio::test]
    async fn cancelled_subscription_yields_nothing() {
        let (sender, receiver) = broadcast::channel(16);
        let target = ConversationRef::Group("group_1".into());
        let mut subscription = Subscription::new(target.clone(), vec![record("old")], receiver);

        subscription.cancel();
        // No receivers left, so the send itself fails.
        assert!(
            sender
                .send(ChangeRecord {
                    conversation: target,
                    record: record("late"),
                })
                .is_err()
        );
        assert!(subscription.is_cancelled());
        assert!(subscription.next().await.is_none());
    }
}
