use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};

use parlor_types::api::Claims;
use parlor_types::models::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Cookie consulted by the streaming upgrade when no header or query token is given.
pub const TOKEN_COOKIE: &str = "access_token";

/// Verified identity attached to a request by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(ApiError::Unauthorized("unauthorized"))
    }
}

/// Extract and validate the JWT from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized("unauthorized"))?;
    let user_id =
        verify_token(token, &state.jwt_secret).ok_or(ApiError::Unauthorized("unauthorized"))?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Token for a streaming upgrade: bearer header first, then the `token`
/// query parameter, then the access-token cookie.
pub fn stream_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_string());
    }
    if let Some(token) = query_token.filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Decode an HS256 token and return the numeric user id in `sub`.
pub fn verify_token(token: &str, secret: &str) -> Option<UserId> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    data.claims.user_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, exp_offset: i64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn verifies_numeric_subject() {
        assert_eq!(verify_token(&token("42", 3600), SECRET), Some(42));
    }

    #[test]
    fn rejects_bad_tokens() {
        assert_eq!(verify_token(&token("42", 3600), "other-secret"), None);
        assert_eq!(verify_token(&token("alice", 3600), SECRET), None);
        assert_eq!(verify_token(&token("42", -3600), SECRET), None);
        assert_eq!(verify_token("not-a-jwt", SECRET), None);
    }

    #[test]
    fn stream_token_prefers_header_then_query_then_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token=from-cookie"));
        assert_eq!(stream_token(&headers, None).as_deref(), Some("from-cookie"));
        assert_eq!(stream_token(&headers, Some("from-query")).as_deref(), Some("from-query"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(stream_token(&headers, Some("from-query")).as_deref(), Some("from-header"));
    }

    #[test]
    fn missing_or_malformed_header_yields_nothing() {
        let mut headers = HeaderMap::new();
        assert_eq!(stream_token(&headers, Some("")), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
