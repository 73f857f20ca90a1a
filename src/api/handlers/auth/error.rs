//! Error taxonomy for auth endpoints.
//!
//! Handlers return `AuthError` and let the `IntoResponse` impl pick the
//! status code and body shape, so every endpoint fails the same way.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing request fields.
    #[error("{0}")]
    InvalidInput(String),

    /// Wrong identifier/password pair. Deliberately indistinguishable from
    /// an unknown identifier.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Access token failed signature or structural checks.
    #[error("Invalid token")]
    InvalidToken,

    /// Access or reset token is past its expiry.
    #[error("Token expired")]
    TokenExpired,

    /// Reset token does not exist or was already consumed.
    #[error("Token not found")]
    TokenNotFound,

    /// The account exists but is disabled.
    #[error("Account is inactive")]
    UserInactive,

    /// Email or username already taken.
    #[error("Email or username already in use")]
    DuplicateIdentity,

    /// Too many attempts in the current window.
    #[error("Too many attempts, retry later")]
    RateLimited { reset_at: i64 },

    /// Request is well-formed but violates a domain rule.
    #[error("{0}")]
    Validation(String),

    /// Anything unexpected. Details are logged, never sent to the client.
    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<i64>,
}

impl AuthError {
    const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::TokenNotFound => StatusCode::UNAUTHORIZED,
            Self::UserInactive => StatusCode::FORBIDDEN,
            Self::DuplicateIdentity => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let reset_time = match &self {
            Self::RateLimited { reset_at } => Some(*reset_at),
            _ => None,
        };

        // Internal details stay in the logs; the client gets a generic message.
        if let Self::Internal(err) = &self {
            error!("Internal auth error: {err:#}");
        }

        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            reset_time,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AuthError::InvalidInput("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::TokenExpired.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::TokenNotFound.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::UserInactive.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::DuplicateIdentity.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::RateLimited { reset_at: 1 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::Validation("rule".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AuthError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rate_limited_body_carries_reset_time() {
        let err = AuthError::RateLimited {
            reset_at: 1_700_000_300,
        };
        let body = ErrorBody {
            success: false,
            error: err.to_string(),
            reset_time: Some(1_700_000_300),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["reset_time"], 1_700_000_300);
    }

    #[test]
    fn internal_error_message_is_generic() {
        let err = AuthError::Internal(anyhow::anyhow!("dsn=postgres://secret"));
        assert_eq!(err.to_string(), "Internal error");
    }

    #[test]
    fn error_body_omits_reset_time_when_absent() {
        let body = ErrorBody {
            success: false,
            error: "Invalid credentials".to_string(),
            reset_time: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("reset_time").is_none());
    }
}
