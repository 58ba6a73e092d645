use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use parlor_types::limits::PageLimits;
use parlor_types::models::{Message, MessageContent, MessageId, PageCursor, RoomId, UserId};

use crate::Database;
use crate::models::MessageRow;

/// Any storage or transport fault. Deliberately opaque: callers report a
/// generic failure and log the detail.
#[derive(Debug, Error)]
#[error("message store failure: {0:#}")]
pub struct StoreError(anyhow::Error);

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

/// Persistence boundary for messages. Never broadcasts and never retries.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert one row and return it with the store-assigned `id` and `created_at`.
    async fn create(
        &self,
        room_id: RoomId,
        user_id: UserId,
        content: &MessageContent,
    ) -> Result<Message, StoreError>;

    /// Newest-first page; with a cursor, only rows strictly older than it.
    /// `limit` falls back to the configured default and is capped at the maximum.
    async fn list_page(
        &self,
        room_id: RoomId,
        limit: Option<u32>,
        cursor: Option<PageCursor>,
    ) -> Result<Vec<Message>, StoreError>;

    /// True iff some message in the room sorts strictly before `(created_at, id)`.
    async fn has_older(
        &self,
        room_id: RoomId,
        created_at: DateTime<Utc>,
        id: MessageId,
    ) -> Result<bool, StoreError>;
}

/// `MessageStore` backed by the SQLite `Database`. Blocking calls run on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteMessageStore {
    db: Arc<Database>,
    limits: PageLimits,
}

impl SqliteMessageStore {
    pub fn new(db: Arc<Database>, limits: PageLimits) -> Self {
        Self { db, limits }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn create(
        &self,
        room_id: RoomId,
        user_id: UserId,
        content: &MessageContent,
    ) -> Result<Message, StoreError> {
        let content = content.as_str().to_owned();
        let row = self
            .blocking(move |db| db.insert_message(room_id, user_id, &content))
            .await?;
        Ok(into_message(row)?)
    }

    async fn list_page(
        &self,
        room_id: RoomId,
        limit: Option<u32>,
        cursor: Option<PageCursor>,
    ) -> Result<Vec<Message>, StoreError> {
        let limit = self.limits.resolve(limit);
        let before = cursor.map(|c| stored_bound(c.before_created_at, c.before_id));
        let rows = self
            .blocking(move |db| db.list_messages(room_id, limit, before))
            .await?;

        rows.into_iter()
            .map(|row| into_message(row).map_err(StoreError::from))
            .collect()
    }

    async fn has_older(
        &self,
        room_id: RoomId,
        created_at: DateTime<Utc>,
        id: MessageId,
    ) -> Result<bool, StoreError> {
        let (created_at, id) = stored_bound(created_at, id);
        self.blocking(move |db| db.has_older_messages(room_id, created_at, id))
            .await
    }
}

/// Map a `(created_at, id)` bound onto the stored microsecond column.
///
/// A timestamp between two microseconds sorts after every row stamped at the
/// lower one regardless of id, so it becomes "before the next microsecond".
fn stored_bound(created_at: DateTime<Utc>, id: MessageId) -> (i64, MessageId) {
    let micros = created_at.timestamp_micros();
    if created_at.timestamp_subsec_nanos() % 1_000 == 0 {
        (micros, id)
    } else {
        (micros + 1, MessageId::MIN)
    }
}

fn into_message(row: MessageRow) -> anyhow::Result<Message> {
    let created_at = DateTime::from_timestamp_micros(row.created_at)
        .ok_or_else(|| anyhow!("Corrupt created_at {} on message {}", row.created_at, row.id))?;

    Ok(Message {
        id: row.id,
        room_id: row.room_id,
        user_id: row.user_id,
        content: row.content,
        created_at,
    })
}
