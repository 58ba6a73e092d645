/// Database row types — these map directly to SQLite rows.
/// Distinct from parlor-types API models to keep the DB layer independent.

pub struct RoomRow {
    pub id: i64,
    pub name: String,
    pub is_public: bool,
}

pub struct MessageRow {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub content: String,
    /// Microseconds since the Unix epoch
    pub created_at: i64,
}
