//! Error types for the client library.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error response from the API.
///
/// `OpenAI` and Anthropic both wrap the message in an `error` object.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

/// Errors that can occur when interacting with LLM APIs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Network or HTTP request failure.
    ///
    /// Indicates issues like DNS resolution, connection failures, or socket errors.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Middleware layer error (retry policy, retry-after handling).
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// API authentication failure (HTTP 401).
    ///
    /// Neither the forwarded credential nor the static key was accepted.
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limit exceeded: {retry_after:?}")]
    RateLimitError {
        /// Suggested wait time before retrying, if provided by the API.
        retry_after: Option<Duration>,
    },

    /// Client configuration issue.
    ///
    /// Missing endpoint, missing credential, or a key that isn't a valid header value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Request timeout.
    #[error("Timeout error")]
    TimeoutError,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The API returned data that doesn't match the expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other non-success status.
    #[error("Request failed: {0}")]
    RequestError(String),

    /// API service unavailable (5xx errors).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ClientError {
    /// Maps a non-success HTTP status and its body to an error.
    ///
    /// Structured `{"error": {"message": ...}}` bodies are unwrapped; anything
    /// else is kept as raw text.
    #[must_use]
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .map_or_else(|_| body.to_string(), |parsed| parsed.error.message);

        match status {
            401 => Self::AuthenticationError(message),
            408 => Self::TimeoutError,
            429 => Self::RateLimitError { retry_after },
            500..=599 => Self::ServiceUnavailable(message),
            _ => Self::RequestError(format!("status {status}: {message}")),
        }
    }

    /// Check if this error is potentially retryable.
    ///
    /// Returns `true` for network errors, timeouts, rate limits, and service unavailable errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::MiddlewareError(_)
                | Self::TimeoutError
                | Self::RateLimitError { .. }
                | Self::ServiceUnavailable(_)
        )
    }

    #[must_use]
    pub const fn is_authentication_error(&self) -> bool {
        matches!(self, Self::AuthenticationError(_))
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitError { retry_after } => *retry_after,
            _ => None,
        }
    }
}
