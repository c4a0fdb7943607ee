use std::time::Duration;

use thiserror::Error;

/// Ways the completion service can fail. None of them are retried.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("completion returned no content")]
    EmptyResponse,

    #[error("timeout after {0:?}")]
    Timeout(Duration),
}
