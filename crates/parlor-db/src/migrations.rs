use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (rooms, messages)");
        conn.execute_batch(
            "
            CREATE TABLE rooms (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                is_public   INTEGER NOT NULL DEFAULT 1
            );

            -- created_at: microseconds since the Unix epoch, assigned on insert
            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id     INTEGER NOT NULL REFERENCES rooms(id),
                user_id     INTEGER NOT NULL,
                content     TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_messages_room_order
                ON messages(room_id, created_at DESC, id DESC);

            -- Seed the default general room
            INSERT INTO rooms (id, name, is_public) VALUES (1, 'general', 1);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
