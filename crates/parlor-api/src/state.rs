use std::sync::Arc;

use parlor_db::{Database, MessageStore, SqliteMessageStore};
use parlor_gateway::hub::BroadcastHub;
use parlor_types::limits::{ContentLimits, PageLimits};

use crate::history::HistoryReader;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub store: Arc<dyn MessageStore>,
    pub history: HistoryReader,
    pub hub: BroadcastHub,
    pub content_limits: ContentLimits,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Wire the SQLite-backed store and the history reader around one database.
    pub fn new(
        db: Arc<Database>,
        hub: BroadcastHub,
        page_limits: PageLimits,
        content_limits: ContentLimits,
        jwt_secret: String,
    ) -> Self {
        let store: Arc<dyn MessageStore> =
            Arc::new(SqliteMessageStore::new(db.clone(), page_limits));
        Self {
            db,
            history: HistoryReader::new(store.clone(), page_limits),
            store,
            hub,
            content_limits,
            jwt_secret,
        }
    }
}
