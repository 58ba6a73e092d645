use crate::Database;
use crate::models::{MessageRow, RoomRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const MESSAGE_COLUMNS: &str = "id, room_id, user_id, content, created_at";

impl Database {
    // -- Rooms --

    pub fn list_rooms(&self) -> Result<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, is_public FROM rooms ORDER BY id ASC")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RoomRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        is_public: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Insert a message. `created_at` is taken while the writer lock is held,
    /// so rows are stamped in insert order.
    pub fn insert_message(&self, room_id: i64, user_id: i64, content: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let created_at = chrono::Utc::now().timestamp_micros();
            let row = conn.query_row(
                &format!(
                    "INSERT INTO messages (room_id, user_id, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)
                     RETURNING {MESSAGE_COLUMNS}"
                ),
                rusqlite::params![room_id, user_id, content, created_at],
                map_message,
            )?;
            Ok(row)
        })
    }

    /// Newest-first page of a room's messages, optionally strictly older than
    /// the `(created_at, id)` cursor.
    pub fn list_messages(
        &self,
        room_id: i64,
        limit: u32,
        before: Option<(i64, i64)>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, room_id, limit, before))
    }

    /// Whether any message in the room sorts strictly before `(created_at, id)`.
    pub fn has_older_messages(&self, room_id: i64, created_at: i64, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS (
                     SELECT 1 FROM messages
                     WHERE room_id = ?1
                       AND (created_at < ?2 OR (created_at = ?2 AND id < ?3))
                 )",
                rusqlite::params![room_id, created_at, id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }
}

fn query_messages(
    conn: &Connection,
    room_id: i64,
    limit: u32,
    before: Option<(i64, i64)>,
) -> Result<Vec<MessageRow>> {
    let rows = match before {
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages
                 WHERE room_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            ))?;
            stmt.query_map(rusqlite::params![room_id, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        Some((created_at, id)) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages
                 WHERE room_id = ?1
                   AND (created_at < ?2 OR (created_at = ?2 AND id < ?3))
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?4"
            ))?;
            stmt.query_map(rusqlite::params![room_id, created_at, id, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(rows)
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}
