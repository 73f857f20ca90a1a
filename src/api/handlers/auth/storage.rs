//! Database helpers for users, sessions, and password reset state.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::state::AuthConfig;
use super::utils::{
    build_reset_url, generate_reset_secret, generate_session_token, hash_reset_secret,
    hash_session_token, is_unique_violation,
};

/// Session insert retries on token hash collision before giving up.
const SESSION_INSERT_ATTEMPTS: usize = 3;

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

/// Outcome when consuming a password reset token.
#[derive(Debug)]
pub(super) enum ResetConsumeOutcome {
    Updated(Uuid),
    NotFound,
    Expired,
}

/// Fields needed to check a login attempt.
pub(super) struct CredentialRecord {
    pub(super) user_id: Uuid,
    pub(super) email: String,
    pub(super) username: String,
    pub(super) password_hash: String,
    pub(super) is_active: bool,
}

/// Minimal data returned for a valid session cookie.
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) username: String,
    pub(crate) expires_at_unix: i64,
}

/// User fields needed after a bearer token is verified.
pub(super) struct UserRecord {
    pub(super) user_id: Uuid,
    pub(super) email: String,
    pub(super) username: String,
    pub(super) password_hash: String,
    pub(super) is_active: bool,
}

/// Look up credentials by email or username.
pub(super) async fn lookup_credential(
    pool: &PgPool,
    identifier: &str,
) -> Result<Option<CredentialRecord>> {
    let query = r"
        SELECT id, email, username, password_hash, is_active
        FROM users
        WHERE email = $1 OR username = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(identifier)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credentials")?;

    Ok(row.map(|row| CredentialRecord {
        user_id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
    }))
}

/// Create a new user row; email and username are unique.
pub(super) async fn insert_user(
    pool: &PgPool,
    email: &str,
    username: &str,
    password_hash: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users
            (email, username, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(super) async fn update_last_login(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = "UPDATE users SET last_login_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update last login")?;
    Ok(())
}

/// Create a session row and return the raw token for the cookie.
///
/// Only the token hash is stored. Retries a few times in the unlikely case of
/// a hash collision on the unique index.
pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
    ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<String> {
    let query = r"
        INSERT INTO user_sessions
            (user_id, token_hash, expires_at, ip, user_agent)
        VALUES ($1, $2, NOW() + make_interval(secs => $3::float8), $4, $5)
    ";

    for _ in 0..SESSION_INSERT_ATTEMPTS {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);

        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(&token_hash)
            .bind(ttl_seconds)
            .bind(ip)
            .bind(user_agent)
            .execute(pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to create session token after retries"))
}

/// Resolve a session token hash and touch its `last_seen_at`.
pub(super) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    let query = r"
        UPDATE user_sessions AS sessions
        SET last_seen_at = NOW()
        FROM users
        WHERE sessions.token_hash = $1
          AND sessions.expires_at > NOW()
          AND users.id = sessions.user_id
        RETURNING
            users.id AS user_id,
            users.email,
            users.username,
            EXTRACT(EPOCH FROM sessions.expires_at)::BIGINT AS expires_at_unix
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("user_id"),
        email: row.get("email"),
        username: row.get("username"),
        expires_at_unix: row.get("expires_at_unix"),
    }))
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM user_sessions WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

/// Look up an active account by normalized email (forgot-password flow).
pub(super) async fn lookup_active_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Uuid>> {
    let query = "SELECT id FROM users WHERE email = $1 AND is_active";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.map(|row| row.get("id")))
}

/// Create or replace the reset token for a user and queue the reset email.
///
/// A user has at most one live reset token; a new request overwrites the old
/// one so only the latest emailed link works.
pub(super) async fn store_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    config: &AuthConfig,
) -> Result<String> {
    let secret = generate_reset_secret()?;
    let token_hash = hash_reset_secret(&secret);

    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let query = r"
        INSERT INTO password_reset_tokens
            (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + make_interval(secs => $3::float8))
        ON CONFLICT (user_id) DO UPDATE
        SET token_hash = EXCLUDED.token_hash,
            expires_at = EXCLUDED.expires_at,
            consumed_at = NULL,
            created_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(&token_hash)
        .bind(config.reset_token_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to store reset token")?;

    let reset_url = build_reset_url(config.frontend_base_url(), &secret);
    let body = format!("Use the link below to reset your Taskpass password:\n\n{reset_url}\n\nThe link expires in one hour. If you did not request this, ignore this email.");

    let query = r"
        INSERT INTO email_outbox
            (recipient, subject, body)
        VALUES ($1, $2, $3)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind("Reset your Taskpass password")
        .bind(&body)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to queue reset email")?;

    tx.commit().await.context("commit reset transaction")?;

    Ok(secret)
}

/// Consume a reset token: set the new password hash, mark the token used,
/// and drop every session for the user.
///
/// The row is locked so two concurrent submissions of the same link cannot
/// both succeed.
pub(super) async fn consume_reset_token(
    pool: &PgPool,
    token_hash: &[u8],
    new_password_hash: &str,
) -> Result<ResetConsumeOutcome> {
    let mut tx = pool.begin().await.context("begin reset consume")?;

    let query = r"
        SELECT user_id, (expires_at <= NOW()) AS expired
        FROM password_reset_tokens
        WHERE token_hash = $1 AND consumed_at IS NULL
        FOR UPDATE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup reset token")?;

    let Some(row) = row else {
        tx.rollback().await.ok();
        return Ok(ResetConsumeOutcome::NotFound);
    };

    if row.get::<bool, _>("expired") {
        tx.rollback().await.ok();
        return Ok(ResetConsumeOutcome::Expired);
    }

    let user_id: Uuid = row.get("user_id");

    let query = "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(new_password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update password")?;

    let query = "UPDATE password_reset_tokens SET consumed_at = NOW() WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to mark reset token consumed")?;

    // Password changed out of band: every existing session is invalid.
    let query = "DELETE FROM user_sessions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to drop user sessions")?;

    tx.commit().await.context("commit reset consume")?;

    Ok(ResetConsumeOutcome::Updated(user_id))
}

/// Look up a user by id (bearer token subject).
pub(super) async fn lookup_user(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, email, username, password_hash, is_active
        FROM users
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.map(|row| UserRecord {
        user_id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
    }))
}

/// Update the password for an authenticated user and drop other sessions.
pub(super) async fn update_password(
    pool: &PgPool,
    user_id: Uuid,
    new_password_hash: &str,
    keep_session_token_hash: Option<&[u8]>,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin password update")?;

    let query = "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(new_password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update password")?;

    // The session that made the change survives; everything else is dropped.
    let query = r"
        DELETE FROM user_sessions
        WHERE user_id = $1
          AND ($2::bytea IS NULL OR token_hash <> $2)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(keep_session_token_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to drop other sessions")?;

    tx.commit().await.context("commit password update")?;

    Ok(())
}
