use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::info;

use parlor_gateway::connection::{self, GatewayContext};

use crate::error::ApiError;
use crate::messages::parse_room_id;
use crate::middleware::{stream_token, verify_token};
use crate::state::AppState;

#[derive(Clone)]
struct StreamState {
    app: AppState,
    gateway: GatewayContext,
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    room_id: Option<String>,
    token: Option<String>,
}

/// `GET /ws?room_id=`: the streaming endpoint, sharing the REST state's hub
/// and store.
pub fn stream_routes(app: AppState, heartbeat_interval: Duration) -> Router {
    let gateway = GatewayContext {
        hub: app.hub.clone(),
        store: app.store.clone(),
        content_limits: app.content_limits,
        heartbeat_interval,
    };
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(StreamState { app, gateway })
}

/// Authenticate, then bind the stream to a room before upgrading.
async fn ws_upgrade(
    State(state): State<StreamState>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = stream_token(&headers, query.token.as_deref())
        .ok_or(ApiError::Unauthorized("unauthorized"))?;
    let user_id = verify_token(&token, &state.app.jwt_secret)
        .ok_or(ApiError::Unauthorized("unauthorized"))?;
    let room_id = parse_room_id(query.room_id.as_deref().unwrap_or_default())?;

    info!("User {} connecting to room {}", user_id, room_id);
    Ok(ws
        .on_upgrade(move |socket| {
            connection::handle_connection(socket, state.gateway, user_id, room_id)
        })
        .into_response())
}
