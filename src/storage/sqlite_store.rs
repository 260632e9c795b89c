use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::common::{
    GroupConversation, Message, MessageStatus, NewMessage, RecentChat, SortKey, UserProfile,
};
use crate::conversation::{ConversationRef, Namespace};

use super::database::Database;
use super::error::{Result, StoreError};
use super::feed::{ChangeRecord, Subscription};
use super::models::MessageRecord;
use super::{DirectoryStore, MessageStore};

const FEED_CAPACITY: usize = 256;

const RECORD_COLUMNS: &str = "id, sender_id, sender_nickname, text, file, timestamp, count, status";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        participants TEXT NOT NULL,
        message_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS groups (
        id TEXT PRIMARY KEY,
        group_name TEXT NOT NULL,
        members TEXT NOT NULL,
        message_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )",
    // Message columns are nullable: documents written by other clients may
    // be incomplete and are validated on read.
    "CREATE TABLE IF NOT EXISTS messages (
        namespace TEXT NOT NULL,
        conversation_id TEXT NOT NULL,
        id TEXT NOT NULL,
        sender_id TEXT,
        sender_nickname TEXT,
        text TEXT,
        file TEXT,
        timestamp INTEGER,
        count INTEGER,
        status TEXT,
        PRIMARY KEY (namespace, conversation_id, id)
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        nickname TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS recent_chats (
        owner_id TEXT NOT NULL,
        chat_id TEXT NOT NULL,
        nickname TEXT NOT NULL,
        last_message TEXT NOT NULL DEFAULT '',
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (owner_id, chat_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_order
        ON messages(namespace, conversation_id, count, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_users_nickname ON users(nickname)",
];

/// Document store backed by SQLite. Collections map to tables and the
/// change feed is an in-process broadcast channel.
pub struct SqliteStore {
    db: Mutex<Database>,
    changes: broadcast::Sender<ChangeRecord>,
    last_timestamp: Mutex<i64>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_database(Database::open(path, SCHEMA)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory(SCHEMA)?)
    }

    fn from_database(db: Database) -> Result<Self> {
        let (changes, _) = broadcast::channel(FEED_CAPACITY);
        Ok(Self {
            db: Mutex::new(db),
            changes,
            last_timestamp: Mutex::new(0),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Server clock: milliseconds, strictly increasing per store.
    fn next_timestamp(&self) -> Result<i64> {
        let mut last = self.last_timestamp.lock().map_err(|_| StoreError::Poisoned)?;
        *last = Utc::now().timestamp_millis().max(*last + 1);
        Ok(*last)
    }

    fn publish(&self, conversation: &ConversationRef, record: MessageRecord) {
        // Sending fails only when nobody is subscribed.
        let _ = self.changes.send(ChangeRecord {
            conversation: conversation.clone(),
            record,
        });
    }

    /// Writes a raw message document as-is (insert or replace) and
    /// publishes it on the change feed. Nothing is validated here.
    pub fn put_record(&self, conversation: &ConversationRef, record: &MessageRecord) -> Result<()> {
        {
            let db = self.lock()?;
            let conn = db.connection();
            ensure_exists(conn, conversation)?;
            insert_record(conn, conversation, record)?;
        }
        self.publish(conversation, record.clone());
        Ok(())
    }

    pub fn message_count(&self, conversation: &ConversationRef) -> Result<u64> {
        let db = self.lock()?;
        read_message_count(db.connection(), conversation)
    }
}

fn table(namespace: Namespace) -> &'static str {
    namespace.as_str()
}

fn ensure_exists(conn: &Connection, conversation: &ConversationRef) -> Result<()> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table(conversation.namespace()));
    conn.query_row(&sql, params![conversation.id()], |_| Ok(()))
        .optional()?
        .ok_or_else(|| StoreError::NotFound(conversation.to_string()))
}

fn read_message_count(conn: &Connection, conversation: &ConversationRef) -> Result<u64> {
    let sql = format!(
        "SELECT message_count FROM {} WHERE id = ?1",
        table(conversation.namespace())
    );
    let count: Option<i64> = conn
        .query_row(&sql, params![conversation.id()], |row| row.get(0))
        .optional()?;
    count
        .map(|count| count.max(0) as u64)
        .ok_or_else(|| StoreError::NotFound(conversation.to_string()))
}

fn insert_record(
    conn: &Connection,
    conversation: &ConversationRef,
    record: &MessageRecord,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO messages
            (namespace, conversation_id, id, sender_id, sender_nickname, text, file, timestamp, count, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            conversation.namespace().as_str(),
            conversation.id(),
            record.id,
            record.sender_id,
            record.sender_nickname,
            record.text,
            record.file,
            record.timestamp,
            record.count,
            record.status
        ],
    )?;
    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_nickname: row.get(2)?,
        text: row.get(3)?,
        file: row.get(4)?,
        timestamp: row.get(5)?,
        count: row.get(6)?,
        status: row.get(7)?,
    })
}

fn load_record(
    conn: &Connection,
    conversation: &ConversationRef,
    message_id: &str,
) -> Result<Option<MessageRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM messages
         WHERE namespace = ?1 AND conversation_id = ?2 AND id = ?3"
    );
    let record = conn
        .query_row(
            &sql,
            params![conversation.namespace().as_str(), conversation.id(), message_id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

/// Position of a raw record in the same `(sequence, timestamp, id)` order
/// the paging query uses, valid or not.
fn raw_key(record: &MessageRecord) -> SortKey {
    SortKey {
        sequence: record.count.unwrap_or(0).max(0) as u64,
        timestamp: record.timestamp.unwrap_or(0),
        id: record.id.clone(),
    }
}

/// Latest `limit` raw records strictly before `cursor`, newest first.
fn latest_records(
    conn: &Connection,
    conversation: &ConversationRef,
    cursor: Option<&SortKey>,
    limit: usize,
) -> Result<Vec<MessageRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM messages
         WHERE namespace = ?1 AND conversation_id = ?2
           AND (?3 IS NULL
                OR MAX(COALESCE(count, 0), 0) < ?3
                OR (MAX(COALESCE(count, 0), 0) = ?3 AND COALESCE(timestamp, 0) < ?4)
                OR (MAX(COALESCE(count, 0), 0) = ?3 AND COALESCE(timestamp, 0) = ?4
                    AND id < ?5))
         ORDER BY MAX(COALESCE(count, 0), 0) DESC, COALESCE(timestamp, 0) DESC, id DESC
         LIMIT ?6"
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(
            params![
                conversation.namespace().as_str(),
                conversation.id(),
                cursor.map(|key| key.sequence as i64),
                cursor.map(|key| key.timestamp),
                cursor.map(|key| key.id.as_str()),
                limit as i64
            ],
            record_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

fn parse_members(raw: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn ensure_conversation(
        &self,
        conversation: &ConversationRef,
        participants: &[String],
    ) -> Result<()> {
        let db = self.lock()?;
        let conn = db.connection();

        let ConversationRef::Direct(id) = conversation else {
            return ensure_exists(conn, conversation);
        };

        let created = conn.execute(
            "INSERT OR IGNORE INTO conversations (id, participants, message_count, created_at)
             VALUES (?1, ?2, 0, ?3)",
            params![
                id,
                serde_json::to_string(participants)?,
                Utc::now().timestamp_millis()
            ],
        )?;
        if created == 1 {
            log::info!("Created conversation {conversation}");
        }
        Ok(())
    }

    async fn participants(&self, conversation: &ConversationRef) -> Result<Vec<String>> {
        let db = self.lock()?;
        let sql = match conversation.namespace() {
            Namespace::Conversations => "SELECT participants FROM conversations WHERE id = ?1",
            Namespace::Groups => "SELECT members FROM groups WHERE id = ?1",
        };
        let raw: Option<String> = db
            .connection()
            .query_row(sql, params![conversation.id()], |row| row.get(0))
            .optional()?;
        match raw {
            Some(raw) => parse_members(&raw),
            None => Err(StoreError::NotFound(conversation.to_string())),
        }
    }

    async fn fetch_page(
        &self,
        conversation: &ConversationRef,
        cursor: Option<&SortKey>,
        page_size: usize,
    ) -> Result<Vec<Message>> {
        let db = self.lock()?;
        let conn = db.connection();
        ensure_exists(conn, conversation)?;

        // Malformed rows take up LIMIT slots, so keep reading raw rows until
        // the page is full or the conversation runs out.
        let mut messages = Vec::with_capacity(page_size);
        let mut raw_cursor = cursor.cloned();
        while messages.len() < page_size {
            let wanted = page_size - messages.len();
            let records = latest_records(conn, conversation, raw_cursor.as_ref(), wanted)?;
            let Some(last) = records.last() else {
                break;
            };
            raw_cursor = Some(raw_key(last));
            let exhausted = records.len() < wanted;

            for record in records {
                match Message::try_from(record) {
                    Ok(message) => messages.push(message),
                    Err(err) => log::warn!("Skipping malformed message in {conversation}: {err}"),
                }
            }
            if exhausted {
                break;
            }
        }
        Ok(messages)
    }

    async fn subscribe_latest(
        &self,
        conversation: &ConversationRef,
        window: usize,
    ) -> Result<Subscription> {
        // Subscribe before reading the backlog so nothing falls in between;
        // overlap is resolved by the caller's merge.
        let receiver = self.changes.subscribe();
        let mut backlog = {
            let db = self.lock()?;
            let conn = db.connection();
            ensure_exists(conn, conversation)?;
            latest_records(conn, conversation, None, window)?
        };
        backlog.reverse();

        log::debug!(
            "Subscribed to {conversation} with {} backlog records",
            backlog.len()
        );
        Ok(Subscription::new(conversation.clone(), backlog, receiver))
    }

    async fn append_message(
        &self,
        conversation: &ConversationRef,
        draft: NewMessage,
    ) -> Result<Message> {
        let count = {
            let db = self.lock()?;
            read_message_count(db.connection(), conversation)?
        };

        // Read and increment are not atomic; other writers may run here.
        tokio::task::yield_now().await;

        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: draft.sender_id,
            sender_nickname: draft.sender_nickname,
            body: draft.body,
            timestamp: self.next_timestamp()?,
            sequence: count + 1,
            status: MessageStatus::Sent,
        };
        let record = MessageRecord::from(&message);

        let advanced = {
            let db = self.lock()?;
            let conn = db.connection();
            insert_record(conn, conversation, &record)?;
            let sql = format!(
                "UPDATE {} SET message_count = ?1 WHERE id = ?2 AND message_count = ?3",
                table(conversation.namespace())
            );
            conn.execute(
                &sql,
                params![message.sequence as i64, conversation.id(), count as i64],
            )? == 1
        };
        self.publish(conversation, record);

        if !advanced {
            log::warn!(
                "Message count of {conversation} moved while appending {}; sequence {} may repeat",
                message.id,
                message.sequence
            );
            return Err(StoreError::WriteConflict {
                message: Box::new(message),
            });
        }

        log::debug!(
            "Appended message {} to {conversation} with sequence {}",
            message.id,
            message.sequence
        );
        Ok(message)
    }

    async fn update_status(
        &self,
        conversation: &ConversationRef,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<()> {
        let updated = {
            let db = self.lock()?;
            let conn = db.connection();
            let current: Option<Option<String>> = conn
                .query_row(
                    "SELECT status FROM messages
                     WHERE namespace = ?1 AND conversation_id = ?2 AND id = ?3",
                    params![conversation.namespace().as_str(), conversation.id(), message_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(current) = current else {
                return Err(StoreError::NotFound(format!(
                    "{conversation}/messages/{message_id}"
                )));
            };

            let current = current
                .and_then(|raw| raw.parse::<MessageStatus>().ok())
                .unwrap_or(MessageStatus::Sent);
            if current >= status {
                None
            } else {
                conn.execute(
                    "UPDATE messages SET status = ?4
                     WHERE namespace = ?1 AND conversation_id = ?2 AND id = ?3",
                    params![
                        conversation.namespace().as_str(),
                        conversation.id(),
                        message_id,
                        status.as_str()
                    ],
                )?;
                load_record(conn, conversation, message_id)?
            }
        };

        if let Some(record) = updated {
            self.publish(conversation, record);
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for SqliteStore {
    async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        let db = self.lock()?;
        db.connection().execute(
            "INSERT INTO users (id, nickname) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET nickname = excluded.nickname",
            params![profile.id, profile.nickname],
        )?;
        Ok(())
    }

    async fn user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let db = self.lock()?;
        let profile = db
            .connection()
            .query_row(
                "SELECT id, nickname FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(UserProfile {
                        id: row.get(0)?,
                        nickname: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    async fn search_users(&self, prefix: &str) -> Result<Vec<UserProfile>> {
        let db = self.lock()?;
        let mut stmt = db.connection().prepare(
            "SELECT id, nickname FROM users
             WHERE nickname >= ?1 AND nickname <= ?2
             ORDER BY nickname",
        )?;
        let upper = format!("{prefix}\u{f8ff}");
        let users = stmt
            .query_map(params![prefix, upper], |row| {
                Ok(UserProfile {
                    id: row.get(0)?,
                    nickname: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    async fn create_group(&self, group: &GroupConversation) -> Result<()> {
        let db = self.lock()?;
        db.connection().execute(
            "INSERT INTO groups (id, group_name, members, message_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group.id,
                group.group_name,
                serde_json::to_string(&group.members)?,
                group.message_count as i64,
                group.created_at
            ],
        )?;
        log::info!(
            "Created group {} ({}) with {} members",
            group.id,
            group.group_name,
            group.members.len()
        );
        Ok(())
    }

    async fn group(&self, group_id: &str) -> Result<Option<GroupConversation>> {
        let row = {
            let db = self.lock()?;
            db.connection()
                .query_row(
                    "SELECT id, group_name, members, message_count, created_at
                     FROM groups WHERE id = ?1",
                    params![group_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )
                .optional()?
        };

        let Some((id, group_name, members, message_count, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(GroupConversation {
            id,
            group_name,
            members: parse_members(&members)?,
            message_count: message_count.max(0) as u64,
            created_at,
        }))
    }

    async fn upsert_recent_chat(&self, owner_id: &str, chat: &RecentChat) -> Result<()> {
        let db = self.lock()?;
        db.connection().execute(
            "INSERT INTO recent_chats (owner_id, chat_id, nickname, last_message, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(owner_id, chat_id) DO UPDATE SET
                nickname = excluded.nickname,
                updated_at = excluded.updated_at",
            params![
                owner_id,
                chat.chat_id,
                chat.nickname,
                chat.last_message,
                chat.updated_at
            ],
        )?;
        Ok(())
    }

    async fn touch_recent_chat(
        &self,
        owner_id: &str,
        chat_id: &str,
        last_message: &str,
        updated_at: i64,
    ) -> Result<()> {
        let db = self.lock()?;
        db.connection().execute(
            "UPDATE recent_chats SET last_message = ?3, updated_at = ?4
             WHERE owner_id = ?1 AND chat_id = ?2",
            params![owner_id, chat_id, last_message, updated_at],
        )?;
        Ok(())
    }

    async fn recent_chats(&self, owner_id: &str) -> Result<Vec<RecentChat>> {
        let db = self.lock()?;
        let mut stmt = db.connection().prepare(
            "SELECT chat_id, nickname, last_message, updated_at
             FROM recent_chats
             WHERE owner_id = ?1
             ORDER BY updated_at DESC, chat_id ASC",
        )?;
        let chats = stmt
            .query_map(params![owner_id], |row| {
                Ok(RecentChat {
                    chat_id: row.get(0)?,
                    nickname: row.get(1)?,
                    last_message: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MessageBody;

    fn draft(sender: &str, text: &str) -> NewMessage {
        NewMessage {
            sender_id: sender.to_string(),
            sender_nickname: sender.to_lowercase(),
            body: MessageBody::Text(text.to_string()),
        }
    }

    async fn direct_store() -> (SqliteStore, ConversationRef) {
        let store = SqliteStore::in_memory().unwrap();
        let conversation = ConversationRef::direct("U1", "U2");
        store
            .ensure_conversation(&conversation, &["U1".to_string(), "U2".to_string()])
            .await
            .unwrap();
        (store, conversation)
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let store = SqliteStore::in_memory().unwrap();
        let conversation = ConversationRef::direct("U1", "U2");
        let err = store.fetch_page(&conversation, None, 20).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let group = ConversationRef::Group("group_1".into());
        let err = store.ensure_conversation(&group, &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn ensure_conversation_is_idempotent() {
        let (store, conversation) = direct_store().await;
        store.append_message(&conversation, draft("U1", "hi")).await.unwrap();
        store
            .ensure_conversation(&conversation, &["U1".to_string(), "U2".to_string()])
            .await
            .unwrap();
        assert_eq!(store.message_count(&conversation).unwrap(), 1);
        assert_eq!(
            store.participants(&conversation).await.unwrap(),
            vec!["U1".to_string(), "U2".to_string()]
        );
    }

    #[tokio::test]
    async fn pages_walk_backwards_without_overlap() {
        let (store, conversation) = direct_store().await;
        for i in 0..45 {
            store
                .append_message(&conversation, draft("U1", &format!("m{i}")))
                .await
                .unwrap();
        }

        let first = store.fetch_page(&conversation, None, 20).await.unwrap();
        assert_eq!(first.len(), 20);
        assert_eq!(first[0].sequence, 45);
        assert_eq!(first[19].sequence, 26);

        let cursor = first.last().map(Message::sort_key);
        let second = store.fetch_page(&conversation, cursor.as_ref(), 20).await.unwrap();
        assert_eq!(second[0].sequence, 25);

        let cursor = second.last().map(Message::sort_key);
        let third = store.fetch_page(&conversation, cursor.as_ref(), 20).await.unwrap();
        assert_eq!(third.len(), 5);
        assert_eq!(third.last().unwrap().sequence, 1);

        let cursor = third.last().map(Message::sort_key);
        let done = store.fetch_page(&conversation, cursor.as_ref(), 20).await.unwrap();
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_collide_but_both_persist() {
        let (store, conversation) = direct_store().await;

        let (first, second) = futures::join!(
            store.append_message(&conversation, draft("U1", "from one")),
            store.append_message(&conversation, draft("U2", "from two")),
        );

        let first = first.unwrap();
        let Err(StoreError::WriteConflict { message: second }) = second else {
            panic!("second append should report a counter conflict");
        };
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 1);
        assert!(second.timestamp > first.timestamp);

        let page = store.fetch_page(&conversation, None, 20).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, second.id);
    }

    #[tokio::test]
    async fn status_only_moves_forward() {
        let (store, conversation) = direct_store().await;
        let message = store.append_message(&conversation, draft("U1", "hi")).await.unwrap();

        store
            .update_status(&conversation, &message.id, MessageStatus::Seen)
            .await
            .unwrap();
        store
            .update_status(&conversation, &message.id, MessageStatus::Sent)
            .await
            .unwrap();

        let page = store.fetch_page(&conversation, None, 1).await.unwrap();
        assert_eq!(page[0].status, MessageStatus::Seen);

        let err = store
            .update_status(&conversation, "missing", MessageStatus::Seen)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_on_read() {
        let (store, conversation) = direct_store().await;
        store.append_message(&conversation, draft("U1", "ok")).await.unwrap();
        store
            .put_record(
                &conversation,
                &MessageRecord {
                    id: "broken".into(),
                    timestamp: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();

        let page = store.fetch_page(&conversation, None, 20).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].body, MessageBody::Text("ok".into()));
    }

    fn raw(id: &str, sender: Option<&str>, count: i64) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            sender_id: sender.map(str::to_string),
            text: Some(id.into()),
            timestamp: Some(1_000 + count),
            count: Some(count),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn a_run_of_malformed_records_does_not_hide_older_history() {
        let (store, conversation) = direct_store().await;
        for n in 1..=5 {
            store.put_record(&conversation, &raw(&format!("a{n:02}"), Some("U1"), n)).unwrap();
        }
        for n in 6..=25 {
            store.put_record(&conversation, &raw(&format!("b{n:02}"), None, n)).unwrap();
        }

        let page = store.fetch_page(&conversation, None, 20).await.unwrap();
        let ids: Vec<_> = page.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a05", "a04", "a03", "a02", "a01"]);

        let cursor = page.last().map(Message::sort_key);
        let rest = store.fetch_page(&conversation, cursor.as_ref(), 20).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn negative_counts_page_like_zero() {
        let (store, conversation) = direct_store().await;
        store.put_record(&conversation, &raw("neg", Some("U1"), -3)).unwrap();
        store.put_record(&conversation, &raw("one", Some("U1"), 1)).unwrap();

        let page = store.fetch_page(&conversation, None, 1).await.unwrap();
        assert_eq!(page[0].id, "one");
        let cursor = page[0].sort_key();
        let older = store.fetch_page(&conversation, Some(&cursor), 1).await.unwrap();
        assert_eq!(older[0].id, "neg");
        assert_eq!(older[0].sequence, 0);

        let cursor = older[0].sort_key();
        let done = store.fetch_page(&conversation, Some(&cursor), 1).await.unwrap();
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn subscription_replays_window_then_follows_changes() {
        let (store, conversation) = direct_store().await;
        for text in ["a", "b", "c"] {
            store.append_message(&conversation, draft("U1", text)).await.unwrap();
        }

        let mut subscription = store.subscribe_latest(&conversation, 2).await.unwrap();
        let live = store.append_message(&conversation, draft("U2", "d")).await.unwrap();

        let texts: Vec<_> = [
            subscription.next().await.unwrap(),
            subscription.next().await.unwrap(),
        ]
        .into_iter()
        .map(|change| change.record.text.unwrap())
        .collect();
        assert_eq!(texts, vec!["b".to_string(), "c".to_string()]);

        let change = subscription.next().await.unwrap();
        assert_eq!(change.record.id, live.id);
        assert_eq!(change.conversation, conversation);
    }

    #[tokio::test]
    async fn nickname_prefix_search_and_recent_chats() {
        let store = SqliteStore::in_memory().unwrap();
        for (id, nickname) in [("u1", "anna"), ("u2", "annabel"), ("u3", "bob")] {
            store
                .upsert_user(&UserProfile {
                    id: id.into(),
                    nickname: nickname.into(),
                })
                .await
                .unwrap();
        }

        let found: Vec<_> = store
            .search_users("ann")
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.id)
            .collect();
        assert_eq!(found, vec!["u1".to_string(), "u2".to_string()]);

        let chat = RecentChat {
            chat_id: "u3".into(),
            nickname: "bob".into(),
            last_message: String::new(),
            updated_at: 10,
        };
        store.upsert_recent_chat("u1", &chat).await.unwrap();
        store.touch_recent_chat("u1", "u3", "hello", 20).await.unwrap();
        store.touch_recent_chat("u1", "nobody", "ignored", 30).await.unwrap();
        store.upsert_recent_chat("u1", &chat).await.unwrap();

        let chats = store.recent_chats("u1").await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].last_message, "hello");
    }
}
