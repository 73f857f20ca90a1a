//! Access token verification endpoint.
//!
//! Lets the task and category services confirm a bearer token without
//! sharing the signing secret.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sqlx::PgPool;
use std::sync::Arc;

use super::{
    error::{AuthError, ErrorBody},
    principal::require_auth,
    state::AuthState,
    types::IdentityResponse,
};

#[utoipa::path(
    get,
    path = "/v1/auth/verify",
    responses(
        (status = 200, description = "Token is valid", body = IdentityResponse),
        (status = 401, description = "Missing, invalid, or expired token", body = ErrorBody),
        (status = 403, description = "Account is inactive", body = ErrorBody)
    ),
    security(
        ("bearer" = [])
    ),
    tag = "auth"
)]
pub async fn verify(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;

    let response = IdentityResponse {
        user_id: principal.user_id.to_string(),
        email: principal.email,
        username: principal.username,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
