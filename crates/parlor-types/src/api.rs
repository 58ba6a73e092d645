use serde::{Deserialize, Serialize};

use crate::models::UserId;

// -- JWT Claims --

/// Claims carried by access tokens. `sub` is the decimal user id.
/// Tokens are issued elsewhere; this service only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Option<UserId> {
        self.sub.parse().ok()
    }
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub content: String,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
