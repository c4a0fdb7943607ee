use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::completion::CompletionError;

/// Why a bearer token was rejected. Every variant reaches the client as the
/// same 401 so account existence never leaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token signature or payload is invalid")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("token subject no longer exists")]
    UnknownSubject,
}

/// Which unique key collided at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Username,
    Email,
}

impl std::fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateField::Username => f.write_str("username"),
            DuplicateField::Email => f.write_str("email"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("duplicate {0}")]
    Duplicate(DuplicateField),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("incorrect username or password")]
    InvalidCredentials,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("completion service failed: {0}")]
    Upstream(#[from] CompletionError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Duplicate(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Internal detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Validation(msg) | ApiError::NotFound(msg) | ApiError::Conflict(msg) => {
                msg.clone()
            }
            ApiError::Duplicate(DuplicateField::Username) => "Username already registered".into(),
            ApiError::Duplicate(DuplicateField::Email) => "Email already registered".into(),
            ApiError::Auth(_) => "Could not validate credentials".into(),
            ApiError::InvalidCredentials => "Incorrect username or password".into(),
            ApiError::Upstream(_) => "Meal plan service is unavailable, please try again".into(),
            ApiError::Internal(_) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Auth(reason) => warn!(%reason, "request not authenticated"),
            ApiError::Upstream(e) => error!(error = %e, "completion service failed"),
            ApiError::Internal(e) => error!(error = ?e, "internal error"),
            _ => {}
        }

        let status = self.status();
        let mut response = (
            status,
            Json(ErrorBody {
                detail: self.client_message(),
            }),
        )
            .into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
