use axum::{Json, extract::State};
use tracing::error;

use parlor_types::models::Room;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, ApiError> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_rooms())
        .await
        .map_err(|e| {
            error!("list_rooms join error: {}", e);
            ApiError::Internal("db error")
        })?
        .map_err(|e| {
            error!("list_rooms failed: {:#}", e);
            ApiError::Internal("db error")
        })?;

    let rooms = rows
        .into_iter()
        .map(|r| Room {
            id: r.id,
            name: r.name,
            is_public: r.is_public,
        })
        .collect();
    Ok(Json(rooms))
}
