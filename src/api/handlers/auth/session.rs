//! Session endpoints and cookie plumbing.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::{
    error::AuthError,
    state::AuthState,
    storage::{delete_session, insert_session, lookup_session, update_last_login, SessionRecord},
    token::{sign_hs256, AccessTokenClaims},
    types::{SessionResponse, TokenResponse},
    utils::{
        extract_bearer_token, extract_client_ip, extract_user_agent, hash_session_token, unix_now,
    },
};

const SESSION_COOKIE_NAME: &str = "taskpass_session";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    security(
        (),
        ("bearer" = [])
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    // A missing token is treated as "no session" to avoid leaking auth state.
    let Some(token) = session_token_from_request(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    match lookup_session(&pool, &token_hash).await {
        Ok(Some(SessionRecord {
            user_id,
            email,
            username,
            expires_at_unix,
        })) => {
            let response = SessionResponse {
                user_id: user_id.to_string(),
                email,
                username,
                expires_at: expires_at_unix,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = session_token_from_request(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Mint an access token plus a session cookie for a freshly authenticated user.
///
/// Shared by register and login so both respond with the same shape.
pub(super) async fn issue_session(
    pool: &PgPool,
    auth_state: &AuthState,
    user_id: Uuid,
    headers: &HeaderMap,
    status: StatusCode,
) -> Result<Response, AuthError> {
    let now = unix_now()?;
    let expires_at = now + auth_state.config().access_token_ttl_seconds();
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        iat: now,
        exp: expires_at,
        jti: Uuid::new_v4().to_string(),
    };
    let access_token = sign_hs256(auth_state.config().signing_secret(), &claims)
        .map_err(|err| anyhow::anyhow!("failed to sign access token: {err}"))?;

    let ip = extract_client_ip(headers);
    let user_agent = extract_user_agent(headers);
    let session_token = insert_session(
        pool,
        user_id,
        auth_state.config().session_ttl_seconds(),
        ip.as_deref(),
        user_agent.as_deref(),
    )
    .await?;

    update_last_login(pool, user_id).await?;

    let mut response_headers = HeaderMap::new();
    match session_cookie(auth_state, &session_token) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }

    let body = TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_at,
    };

    Ok((status, response_headers, Json(body)).into_response())
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    auth_state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = auth_state.config().session_ttl_seconds();
    // Only mark cookies secure when the frontend is served over HTTPS.
    let secure = auth_state.config().session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(
    auth_config: &super::state::AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = auth_config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Resolve the opaque session token from the request.
///
/// Browsers send the cookie; non-browser clients may present the same opaque
/// token as a bearer credential instead. The cookie wins when both are set.
fn session_token_from_request(headers: &HeaderMap) -> Option<String> {
    extract_session_token(headers).or_else(|| extract_bearer_token(headers))
}

/// Pull the session token out of the `Cookie` header, if any.
pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers
        .get(axum::http::header::COOKIE)
        .and_then(|value| value.to_str().ok())?;
    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let name = parts.next()?;
        if name == SESSION_COOKIE_NAME {
            let value = parts.next().unwrap_or_default().trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}
