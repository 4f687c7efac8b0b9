//! Static allow-list authentication.
//!
//! Callers identify themselves with an `X-User-Email` header. When
//! `auth.allowed_users` is empty every caller is accepted.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the caller's identity.
pub const USER_HEADER: &str = "x-user-email";

/// Middleware rejecting callers that are not on the allow-list with 401.
pub async fn require_allowed_user(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.config.auth.allowed_users.is_empty() {
        return next.run(req).await;
    }

    let user = req
        .headers()
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if user.trim().is_empty() {
        return ApiError::Unauthorized("Missing X-User-Email header".to_string()).into_response();
    }
    if !state.config.auth.is_allowed(user) {
        tracing::warn!(user = %user.trim(), "rejected caller not on allow-list");
        return ApiError::Unauthorized("Unauthorized".to_string()).into_response();
    }

    next.run(req).await
}
