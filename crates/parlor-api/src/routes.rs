use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{messages, rooms};

/// REST surface. History and room listing are public; posting needs a
/// verified bearer token.
pub fn rest_routes(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{id}/messages", get(messages::list_messages));

    let protected = Router::new()
        .route("/rooms/{id}/messages", post(messages::create_message))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public.merge(protected).with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
