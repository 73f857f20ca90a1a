//! Password login.

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
    password::verify_password,
    rate_limit::{enforce, RateLimitAction},
    session::issue_session,
    state::AuthState,
    storage::lookup_credential,
    types::{LoginRequest, TokenResponse},
    utils::extract_client_ip,
};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded, session issued", body = TokenResponse),
        (status = 400, description = "Malformed request", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 403, description = "Account is inactive", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidInput("Missing payload".to_string()));
    };

    // One identifier field serves both email and username logins.
    let identifier = request.identifier.trim().to_lowercase();
    if identifier.is_empty() || request.password.is_empty() {
        return Err(AuthError::InvalidInput("Missing credentials".to_string()));
    }

    // Rate-limit before any password work so abuse stays cheap to reject.
    let client_ip = extract_client_ip(&headers);
    let ip_key = format!(
        "{}:ip:{}",
        RateLimitAction::Login.as_str(),
        client_ip.as_deref().unwrap_or("unknown")
    );
    enforce(auth_state.rate_limiter(), &ip_key, RateLimitAction::Login)?;

    let identifier_key = format!("{}:id:{}", RateLimitAction::Login.as_str(), identifier);
    enforce(
        auth_state.rate_limiter(),
        &identifier_key,
        RateLimitAction::Login,
    )?;

    let Some(record) = lookup_credential(&pool, &identifier).await? else {
        // Burn an equivalent verification so unknown identifiers cost the
        // same as a wrong password.
        let _ = verify_password(&request.password, auth_state.dummy_password_hash());
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(&request.password, &record.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    // Checked after the password so a probe cannot tell "inactive" from
    // "wrong password" without knowing the credentials.
    if !record.is_active {
        return Err(AuthError::UserInactive);
    }

    info!("User logged in: {}", record.user_id);

    issue_session(&pool, &auth_state, record.user_id, &headers, StatusCode::OK).await
}
