//! Account registration.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{Json, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::{
    error::{AuthError, ErrorBody},
    password::hash_password,
    rate_limit::{enforce, RateLimitAction},
    session::issue_session,
    state::AuthState,
    storage::{insert_user, SignupOutcome},
    types::{RegisterRequest, TokenResponse},
    utils::{
        extract_client_ip, normalize_email, normalize_username, valid_email, valid_password,
        valid_username,
    },
};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, session issued", body = TokenResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 409, description = "Email or username already in use", body = ErrorBody),
        (status = 422, description = "Password policy violation", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidInput("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::InvalidInput("Invalid email".to_string()));
    }

    let username = normalize_username(&request.username);
    if !valid_username(&username) {
        return Err(AuthError::InvalidInput("Invalid username".to_string()));
    }

    if !valid_password(&request.password) {
        return Err(AuthError::Validation(
            "Password must be 8 to 128 characters".to_string(),
        ));
    }

    let client_ip = extract_client_ip(&headers);
    let ip_key = format!(
        "{}:ip:{}",
        RateLimitAction::Signup.as_str(),
        client_ip.as_deref().unwrap_or("unknown")
    );
    enforce(auth_state.rate_limiter(), &ip_key, RateLimitAction::Signup)?;

    // Hash before the insert so the unique check and the write stay together.
    let password_hash = hash_password(&request.password)?;

    match insert_user(&pool, &email, &username, &password_hash).await? {
        SignupOutcome::Conflict => Err(AuthError::DuplicateIdentity),
        SignupOutcome::Created(user_id) => {
            info!("User registered: {user_id}");
            issue_session(&pool, &auth_state, user_id, &headers, StatusCode::CREATED).await
        }
    }
}
