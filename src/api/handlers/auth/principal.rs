//! Bearer token authentication shared by protected endpoints.

use axum::http::HeaderMap;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    error::AuthError,
    state::AuthState,
    storage::lookup_user,
    token::{self, verify_hs256},
    utils::{extract_bearer_token, unix_now},
};

/// Verified caller identity, re-checked against the database.
pub(crate) struct Principal {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) username: String,
    pub(super) password_hash: String,
}

/// Verify the bearer access token and load the user behind it.
///
/// The token is self-contained, but the subject is re-checked so a disabled
/// or deleted account cannot keep using an old token.
pub(super) async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Principal, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::InvalidToken)?;

    let now = unix_now()?;
    let claims = verify_hs256(auth_state.config().signing_secret(), &token, now).map_err(
        |err| match err {
            token::Error::Expired => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        },
    )?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

    let user = lookup_user(pool, user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    if !user.is_active {
        return Err(AuthError::UserInactive);
    }

    Ok(Principal {
        user_id: user.user_id,
        email: user.email,
        username: user.username,
        password_hash: user.password_hash,
    })
}
