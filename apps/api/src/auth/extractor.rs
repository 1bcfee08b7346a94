use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::auth::jwt::decode_token;
use crate::errors::AppError;
use crate::models::user::{self, User};
use crate::state::AppState;

/// The authenticated caller. Rejects with 401 when the bearer token is
/// missing, invalid, expired or names a user that no longer exists.
pub struct AuthUser(pub User);

/// The caller when a valid bearer token is present, otherwise `None`.
pub struct MaybeAuthUser(pub Option<User>);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves a raw token to its user. Shared by the extractors and the collaboration socket.
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = decode_token(token, &state.config.jwt_secret)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    user::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("No token, authorization denied".into()))?;
        Ok(AuthUser(authenticate(state, token).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(MaybeAuthUser(None));
        };
        match authenticate(state, token).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(AppError::Unauthorized(_)) => Ok(MaybeAuthUser(None)),
            Err(e) => Err(e),
        }
    }
}
