use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, error};

use parlor_types::api::CreateMessageRequest;
use parlor_types::models::{MessageContent, MessagePage, PageCursor, RoomId};
use parlor_types::timestamp;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Raw history query. Values are kept as strings so that empty parameters
/// count as absent and bad ones map to a validation error instead of an
/// extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
    pub before_ts: Option<String>,
    pub before_id: Option<String>,
}

impl HistoryQuery {
    pub fn limit(&self) -> Result<Option<u32>, ApiError> {
        let Some(raw) = present(&self.limit) else {
            return Ok(None);
        };
        match raw.parse::<i64>() {
            Ok(n) if n > 0 => Ok(Some(u32::try_from(n).unwrap_or(u32::MAX))),
            _ => Err(ApiError::validation("invalid limit")),
        }
    }

    /// Both halves of the cursor, or neither.
    pub fn cursor(&self) -> Result<Option<PageCursor>, ApiError> {
        match (present(&self.before_ts), present(&self.before_id)) {
            (None, None) => Ok(None),
            (Some(ts), Some(id)) => {
                let before_created_at =
                    timestamp::parse(ts).ok_or_else(|| ApiError::validation("invalid before_ts"))?;
                let before_id = id
                    .parse()
                    .map_err(|_| ApiError::validation("invalid before_id"))?;
                Ok(Some(PageCursor {
                    before_created_at,
                    before_id,
                }))
            }
            _ => Err(ApiError::validation(
                "before_ts and before_id must be given together",
            )),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_room_id(raw: &str) -> Result<RoomId, ApiError> {
    match raw.trim().parse::<RoomId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::validation("invalid room id")),
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagePage>, ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let limit = query.limit()?;
    let cursor = query.cursor()?;

    let page = state
        .history
        .get_page(room_id, limit, cursor)
        .await
        .map_err(|e| {
            error!("History read for room {} failed: {}", room_id, e);
            ApiError::Internal("db error")
        })?;

    Ok(Json(page))
}

/// Persist a message and fan it out to the room's live sessions.
pub async fn create_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let room_id = parse_room_id(&room_id)?;
    let Json(req) = body.map_err(|e| {
        debug!("Rejected message body: {}", e);
        ApiError::validation("invalid json")
    })?;
    let content = MessageContent::parse(&req.content, &state.content_limits)
        .map_err(|_| ApiError::validation(state.content_limits.bounds_message()))?;

    let message = state
        .store
        .create(room_id, user_id, &content)
        .await
        .map_err(|e| {
            error!("Insert into room {} by user {} failed: {}", room_id, user_id, e);
            ApiError::Internal("insert error")
        })?;

    let delivered = state.hub.broadcast(&message);
    debug!(
        "Message {} in room {} delivered to {} sessions",
        message.id, room_id, delivered
    );

    Ok((StatusCode::CREATED, Json(message)))
}
