//! Password reset flow: request a link, then redeem it.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    error::{AuthError, ErrorBody},
    password::hash_password,
    rate_limit::{enforce, RateLimitAction},
    state::AuthState,
    storage::{
        consume_reset_token, lookup_active_user_by_email, store_reset_token, ResetConsumeOutcome,
    },
    types::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest},
    utils::{extract_client_ip, hash_reset_secret, normalize_email, valid_email, valid_password},
};

const FORGOT_RESPONSE: &str = "If the email exists, a reset link has been sent";

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset requested; response is the same whether or not the account exists", body = MessageResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidInput("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);

    let client_ip = extract_client_ip(&headers);
    let ip_key = format!(
        "{}:ip:{}",
        RateLimitAction::ForgotPassword.as_str(),
        client_ip.as_deref().unwrap_or("unknown")
    );
    enforce(
        auth_state.rate_limiter(),
        &ip_key,
        RateLimitAction::ForgotPassword,
    )?;

    let email_key = format!("{}:email:{}", RateLimitAction::ForgotPassword.as_str(), email);
    enforce(
        auth_state.rate_limiter(),
        &email_key,
        RateLimitAction::ForgotPassword,
    )?;

    // A malformed or unknown email gets the same response as a real one, so
    // this endpoint cannot be used to probe accounts.
    if valid_email(&email) {
        if let Some(user_id) = lookup_active_user_by_email(&pool, &email).await? {
            let _secret = store_reset_token(&pool, user_id, &email, auth_state.config()).await?;
            info!("Password reset requested: {user_id}");
        } else {
            debug!("Password reset requested for unknown email");
        }
    }

    let body = MessageResponse {
        success: true,
        message: FORGOT_RESPONSE.to_string(),
    };

    Ok((StatusCode::OK, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated, sessions revoked", body = MessageResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 401, description = "Token unknown, consumed, or expired", body = ErrorBody),
        (status = 422, description = "Password policy violation", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidInput("Missing payload".to_string()));
    };

    let token = request.token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidInput("Missing token".to_string()));
    }

    if !valid_password(&request.new_password) {
        return Err(AuthError::Validation(
            "Password must be 8 to 128 characters".to_string(),
        ));
    }

    let client_ip = extract_client_ip(&headers);
    let ip_key = format!(
        "{}:ip:{}",
        RateLimitAction::ResetPassword.as_str(),
        client_ip.as_deref().unwrap_or("unknown")
    );
    enforce(
        auth_state.rate_limiter(),
        &ip_key,
        RateLimitAction::ResetPassword,
    )?;

    let token_hash = hash_reset_secret(token);
    let new_password_hash = hash_password(&request.new_password)?;

    match consume_reset_token(&pool, &token_hash, &new_password_hash).await? {
        ResetConsumeOutcome::NotFound => Err(AuthError::TokenNotFound),
        ResetConsumeOutcome::Expired => Err(AuthError::TokenExpired),
        ResetConsumeOutcome::Updated(user_id) => {
            info!("Password reset completed: {user_id}");
            let body = MessageResponse {
                success: true,
                message: "Password has been reset".to_string(),
            };
            Ok((StatusCode::OK, Json(body)).into_response())
        }
    }
}
