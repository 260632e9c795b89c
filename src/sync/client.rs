use std::sync::Arc;

use tokio::sync::mpsc;

use crate::common::{Identity, MessageBody, SyncCommand, SyncEvent};
use crate::config::SyncConfig;
use crate::directory::Directory;
use crate::storage::{ChangeRecord, DirectoryStore, MessageStore};

use super::cache::Merge;
use super::engine::SyncEngine;
use super::error::SyncResult;

/// Event loop between the UI and the store.
///
/// Commands and live deliveries are handled one at a time, each to
/// completion, so the engine never sees two operations interleave.
pub struct SyncClient<S> {
    engine: SyncEngine<S>,
    directory: Directory<S>,
    event_sender: mpsc::Sender<SyncEvent>,
    command_receiver: mpsc::Receiver<SyncCommand>,
}

impl<S> SyncClient<S>
where
    S: MessageStore + DirectoryStore,
{
    pub fn new(
        store: Arc<S>,
        identity: Identity,
        config: SyncConfig,
        event_sender: mpsc::Sender<SyncEvent>,
        command_receiver: mpsc::Receiver<SyncCommand>,
    ) -> Self {
        Self {
            engine: SyncEngine::new(store.clone(), identity, config),
            directory: Directory::new(store),
            event_sender,
            command_receiver,
        }
    }

    pub async fn run(mut self) {
        if let Err(err) = self.directory.register(self.engine.identity()).await {
            log::error!("Failed to register user profile: {err}");
            self.emit(SyncEvent::Error(err.to_string())).await;
        }
        log::info!("Sync loop started for {}", self.engine.identity().user_id);

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    if let Some(command) = command {
                        self.handle_command(command).await;
                    } else {
                        break;
                    }
                }
                change = self.engine.next_delivery() => {
                    if let Some(change) = change {
                        self.handle_change(change).await;
                    }
                }
            }
        }

        self.engine.close();
        log::info!("Sync loop stopped");
    }

    async fn handle_command(&mut self, command: SyncCommand) {
        log::debug!("Handling {command:?}");
        if let Err(err) = self.apply(command).await {
            log::warn!("Command failed: {err}");
            self.emit(SyncEvent::Error(err.to_string())).await;
        }
    }

    async fn apply(&mut self, command: SyncCommand) -> SyncResult<()> {
        match command {
            SyncCommand::OpenChat { chat_id } => {
                self.engine.open_chat(&chat_id).await?;
                self.emit_opened().await;
            }
            SyncCommand::CreateGroup { name, members } => {
                let group = self
                    .directory
                    .create_group(self.engine.identity(), &members, &name)
                    .await?;
                let group_id = group.id.clone();
                self.emit(SyncEvent::GroupCreated(group)).await;
                self.engine.open_group(&group_id).await?;
                self.emit_opened().await;
            }
            SyncCommand::LoadOlder => {
                if self.engine.load_older().await? {
                    self.emit_snapshot().await;
                } else if self.engine.history_exhausted() {
                    if let Some(conversation) = self.engine.active_conversation().cloned() {
                        self.emit(SyncEvent::HistoryExhausted(conversation)).await;
                    }
                }
            }
            SyncCommand::MarkVisible { message_id } => {
                if self.engine.mark_visible(&message_id).await? {
                    self.emit_snapshot().await;
                }
            }
            SyncCommand::SendText(text) => {
                self.engine.send(MessageBody::Text(text)).await?;
                self.emit_snapshot().await;
            }
            SyncCommand::SendFile(reference) => {
                self.engine.send(MessageBody::File(reference)).await?;
                self.emit_snapshot().await;
            }
            SyncCommand::Close => {
                self.engine.close();
                self.emit(SyncEvent::Closed).await;
            }
            SyncCommand::SearchUsers { prefix } => {
                let users = self
                    .directory
                    .search_users(&prefix, &self.engine.identity().user_id)
                    .await?;
                self.emit(SyncEvent::SearchResults(users)).await;
            }
            SyncCommand::RecentChats => {
                let chats = self
                    .directory
                    .recent_chats(&self.engine.identity().user_id)
                    .await?;
                self.emit(SyncEvent::RecentChats(chats)).await;
            }
        }
        Ok(())
    }

    async fn handle_change(&mut self, change: ChangeRecord) {
        match self.engine.handle_delivery(change).await {
            Ok(Merge::Inserted | Merge::Updated) => self.emit_snapshot().await,
            Ok(Merge::Unchanged | Merge::Discarded) => {}
            Err(err) => {
                log::warn!("Live update failed: {err}");
                self.emit(SyncEvent::Error(err.to_string())).await;
            }
        }
    }

    async fn emit_opened(&self) {
        let Some(session) = self.engine.session() else {
            return;
        };
        let opened = SyncEvent::Opened {
            conversation: session.conversation().clone(),
            title: session.title().to_string(),
        };
        self.emit(opened).await;
        self.emit_snapshot().await;
    }

    async fn emit_snapshot(&self) {
        let Some(conversation) = self.engine.active_conversation().cloned() else {
            return;
        };
        let messages = self.engine.snapshot();
        self.emit(SyncEvent::Snapshot {
            conversation,
            messages,
        })
        .await;
    }

    async fn emit(&self, event: SyncEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify UI: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserProfile;
    use crate::storage::SqliteStore;

    async fn next_event(events: &mut mpsc::Receiver<SyncEvent>) -> SyncEvent {
        events.recv().await.expect("sync loop ended early")
    }

    #[tokio::test]
    async fn loop_surfaces_errors_and_snapshots() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .upsert_user(&UserProfile {
                id: "U2".into(),
                nickname: "bob".into(),
            })
            .await
            .unwrap();

        let (command_sender, command_receiver) = mpsc::channel(16);
        let (event_sender, mut events) = mpsc::channel(16);
        let identity = Identity {
            user_id: "U1".into(),
            nickname: "ann".into(),
        };
        let client = SyncClient::new(
            store,
            identity,
            SyncConfig::default(),
            event_sender,
            command_receiver,
        );
        let handle = tokio::spawn(client.run());

        command_sender
            .send(SyncCommand::SendText("too early".into()))
            .await
            .unwrap();
        assert_eq!(
            next_event(&mut events).await,
            SyncEvent::Error("select a conversation first".into())
        );

        command_sender
            .send(SyncCommand::OpenChat {
                chat_id: "U2".into(),
            })
            .await
            .unwrap();
        let SyncEvent::Opened { title, .. } = next_event(&mut events).await else {
            panic!("expected the chat to open");
        };
        assert_eq!(title, "bob");
        assert!(matches!(
            next_event(&mut events).await,
            SyncEvent::Snapshot { messages, .. } if messages.is_empty()
        ));

        command_sender
            .send(SyncCommand::SendText("hi bob".into()))
            .await
            .unwrap();
        let SyncEvent::Snapshot { messages, .. } = next_event(&mut events).await else {
            panic!("expected a snapshot after sending");
        };
        assert_eq!(messages.len(), 1);

        command_sender.send(SyncCommand::LoadOlder).await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            SyncEvent::HistoryExhausted(_)
        ));

        drop(command_sender);
        handle.await.unwrap();
    }
}
