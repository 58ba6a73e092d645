use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limits::ContentLimits;

pub type RoomId = i64;
pub type UserId = i64;
pub type MessageId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub is_public: bool,
}

/// A persisted chat message. Immutable once the store has returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: String,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The composite `(created_at, id)` key that totally orders a room's history.
    pub fn cursor(&self) -> PageCursor {
        PageCursor {
            before_created_at: self.created_at,
            before_id: self.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("content is empty")]
    Empty,
    #[error("content length 1..{max}")]
    TooLong { max: usize },
}

/// Message text that has been trimmed and length-checked.
///
/// The store only accepts this type, so unchecked input cannot reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn parse(raw: &str, limits: &ContentLimits) -> Result<Self, ContentError> {
        let trimmed = raw.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
        let len = trimmed.chars().count();
        if len == 0 {
            return Err(ContentError::Empty);
        }
        if len > limits.max_chars {
            return Err(ContentError::TooLong {
                max: limits.max_chars,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Exclusive upper bound for the next older page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub before_created_at: DateTime<Utc>,
    pub before_id: MessageId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(
        default,
        with = "crate::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_before_ts: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_before_id: Option<MessageId>,
    pub has_more: bool,
}

impl PageInfo {
    pub fn next_cursor(&self) -> Option<PageCursor> {
        Some(PageCursor {
            before_created_at: self.next_before_ts?,
            before_id: self.next_before_id?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePage {
    pub items: Vec<Message>,
    pub page_info: PageInfo,
}
