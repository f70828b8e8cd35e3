use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use eqviz_core::users::{self, User};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// The user owning the token presented in `Authorization: Bearer <token>`.
pub struct AuthUser(pub User);

fn extract_bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts)
            .ok_or(ApiError::Unauthorized(
                "Authentication credentials were not provided.",
            ))?
            .to_string();

        match users::authenticate(state.repository(), &token).await? {
            Some(user) => Ok(AuthUser(user)),
            None => {
                warn!(path = %parts.uri.path(), "rejected request with invalid token");
                Err(ApiError::Unauthorized("Invalid token."))
            }
        }
    }
}
