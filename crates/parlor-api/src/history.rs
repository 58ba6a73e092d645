use std::sync::Arc;

use tracing::warn;

use parlor_db::{MessageStore, StoreError};
use parlor_types::limits::PageLimits;
use parlor_types::models::{MessagePage, PageCursor, PageInfo, RoomId};

/// Builds history pages with continuation info on top of a [`MessageStore`].
#[derive(Clone)]
pub struct HistoryReader {
    store: Arc<dyn MessageStore>,
    limits: PageLimits,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn MessageStore>, limits: PageLimits) -> Self {
        Self { store, limits }
    }

    /// Read one page, newest first.
    ///
    /// The next cursor is only emitted for a full page, and `has_more` comes
    /// from probing the store past the last row. A failed probe is logged and
    /// reported as `has_more: false`; the page itself is still returned.
    pub async fn get_page(
        &self,
        room_id: RoomId,
        limit: Option<u32>,
        cursor: Option<PageCursor>,
    ) -> Result<MessagePage, StoreError> {
        let limit = self.limits.resolve(limit);
        let items = self.store.list_page(room_id, Some(limit), cursor).await?;

        let mut page_info = PageInfo::default();
        if let Some(last) = items.last().filter(|_| items.len() == limit as usize) {
            page_info.next_before_ts = Some(last.created_at);
            page_info.next_before_id = Some(last.id);
            page_info.has_more = match self.store.has_older(room_id, last.created_at, last.id).await {
                Ok(more) => more,
                Err(e) => {
                    warn!("has_more probe failed for room {}: {}", room_id, e);
                    false
                }
            };
        }

        Ok(MessagePage { items, page_info })
    }
}
