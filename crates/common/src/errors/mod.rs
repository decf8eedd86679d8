//! Error types for the CiteGuard service
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! Error messages never carry raw query text or API keys; callers log those
//! under their own field names with redaction where needed.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    InvalidInput,
    InvalidThreshold,
    InvalidLanguage,

    // Rate limiting (2xxx)
    RateLimited,

    // Deadline errors (3xxx)
    DeadlineExceeded,

    // Capability errors (4xxx)
    UnsupportedOperation,

    // Availability errors (5xxx)
    Unavailable,
    EmbeddingError,
    IndexCorrupted,

    // Infrastructure errors (6xxx)
    CacheError,
    PersistenceError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::InvalidInput => 1001,
            ErrorCode::InvalidThreshold => 1002,
            ErrorCode::InvalidLanguage => 1003,

            // Rate limits (2xxx)
            ErrorCode::RateLimited => 2001,

            // Deadlines (3xxx)
            ErrorCode::DeadlineExceeded => 3001,

            // Capabilities (4xxx)
            ErrorCode::UnsupportedOperation => 4001,

            // Availability (5xxx)
            ErrorCode::Unavailable => 5001,
            ErrorCode::EmbeddingError => 5002,
            ErrorCode::IndexCorrupted => 5003,

            // Infrastructure (6xxx)
            ErrorCode::CacheError => 6001,
            ErrorCode::PersistenceError => 6002,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum CoreError {
    // Validation errors
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Threshold {value} out of range [0, 1]")]
    InvalidThreshold { value: f32 },

    #[error("Unknown language code: {code}")]
    InvalidLanguage { code: String },

    // Rate limiting (request-level; per-source adapter limits are silent)
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Deadline errors
    #[error("Deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    // Capability errors
    #[error("Unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    // Availability errors
    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Embedding service error: {message}")]
    Embedding { message: String },

    #[error("Index corrupted: {message}")]
    IndexCorrupted { message: String },

    // Infrastructure errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::InvalidInput { .. } => ErrorCode::InvalidInput,
            CoreError::InvalidThreshold { .. } => ErrorCode::InvalidThreshold,
            CoreError::InvalidLanguage { .. } => ErrorCode::InvalidLanguage,
            CoreError::RateLimited { .. } => ErrorCode::RateLimited,
            CoreError::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            CoreError::UnsupportedOperation { .. } => ErrorCode::UnsupportedOperation,
            CoreError::Unavailable { .. } => ErrorCode::Unavailable,
            CoreError::Embedding { .. } => ErrorCode::EmbeddingError,
            CoreError::IndexCorrupted { .. } => ErrorCode::IndexCorrupted,
            CoreError::Cache { .. } => ErrorCode::CacheError,
            CoreError::Persistence { .. } => ErrorCode::PersistenceError,
            CoreError::HttpClient(_) => ErrorCode::Unavailable,
            CoreError::Internal { .. } => ErrorCode::InternalError,
            CoreError::Configuration { .. } => ErrorCode::ConfigurationError,
            CoreError::Serialization(_) => ErrorCode::SerializationError,
            CoreError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            CoreError::InvalidInput { .. }
            | CoreError::InvalidThreshold { .. }
            | CoreError::InvalidLanguage { .. }
            | CoreError::UnsupportedOperation { .. } => StatusCode::BAD_REQUEST,

            // 429 Too Many Requests
            CoreError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 504 Gateway Timeout
            CoreError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,

            // 503 Service Unavailable
            CoreError::Unavailable { .. }
            | CoreError::Embedding { .. }
            | CoreError::IndexCorrupted { .. }
            | CoreError::Cache { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 502 Bad Gateway
            CoreError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            CoreError::Persistence { .. }
            | CoreError::Internal { .. }
            | CoreError::Configuration { .. }
            | CoreError::Serialization(_)
            | CoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Metric label for the error kind, recorded on every recoverable error
    pub fn kind_label(&self) -> &'static str {
        match self.code() {
            ErrorCode::InvalidInput | ErrorCode::InvalidThreshold | ErrorCode::InvalidLanguage => {
                "invalid_input"
            }
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::DeadlineExceeded => "deadline_exceeded",
            ErrorCode::UnsupportedOperation => "unsupported_operation",
            ErrorCode::Unavailable | ErrorCode::EmbeddingError | ErrorCode::IndexCorrupted => {
                "unavailable"
            }
            ErrorCode::CacheError => "cache",
            ErrorCode::PersistenceError => "persistence",
            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::SerializationError => "internal",
        }
    }
}

/// Structured error response for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        crate::metrics::record_error(self.kind_label());

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        CoreError::Cache {
            message: err.to_string(),
        }
    }
}
