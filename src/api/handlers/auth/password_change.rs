//! Password change for an authenticated user.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::{
    error::{AuthError, ErrorBody},
    password::{hash_password, verify_password},
    principal::require_auth,
    rate_limit::{enforce, RateLimitAction},
    session::extract_session_token,
    state::AuthState,
    storage::update_password,
    types::{ChangePasswordRequest, MessageResponse},
    utils::{hash_session_token, valid_password},
};

#[utoipa::path(
    post,
    path = "/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated, other sessions revoked", body = MessageResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 401, description = "Missing token or wrong current password", body = ErrorBody),
        (status = 422, description = "Password policy violation", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    security(
        ("bearer" = [])
    ),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<Response, AuthError> {
    let principal = require_auth(&headers, &pool, &auth_state).await?;

    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidInput("Missing payload".to_string()));
    };

    // Keyed by user, not IP: a password change is always an authenticated act.
    let user_key = format!(
        "{}:user:{}",
        RateLimitAction::ChangePassword.as_str(),
        principal.user_id
    );
    enforce(
        auth_state.rate_limiter(),
        &user_key,
        RateLimitAction::ChangePassword,
    )?;

    if !valid_password(&request.new_password) {
        return Err(AuthError::Validation(
            "Password must be 8 to 128 characters".to_string(),
        ));
    }

    if request.new_password == request.current_password {
        return Err(AuthError::Validation(
            "New password must differ from the current password".to_string(),
        ));
    }

    if !verify_password(&request.current_password, &principal.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    let new_password_hash = hash_password(&request.new_password)?;

    // The session driving this request stays alive; all others are revoked.
    let current_session_hash =
        extract_session_token(&headers).map(|token| hash_session_token(&token));
    update_password(
        &pool,
        principal.user_id,
        &new_password_hash,
        current_session_hash.as_deref(),
    )
    .await?;

    info!("Password changed: {}", principal.user_id);

    let body = MessageResponse {
        success: true,
        message: "Password has been changed".to_string(),
    };

    Ok((StatusCode::OK, Json(body)).into_response())
}
