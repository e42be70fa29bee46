//! Error types for scrape-orchestrator
//!
//! Two layers of errors live here:
//! - [`Error`] — orchestrator-level errors surfaced synchronously to callers
//!   of `start`/`cancel` and to the REST API, with HTTP status mapping.
//! - [`ScrapeError`] — the task-level taxonomy that `SourceScraper`
//!   implementations must use so the retry policy can tell transient
//!   failures from permanent ones.

use crate::types::OperationId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the orchestrator
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "run.timeout_per_task")
        key: Option<String>,
    },

    /// A start request named no sources at all
    #[error("no sources requested")]
    EmptySources,

    /// A start request named a source no scraper is registered for
    #[error("unknown source: {source}")]
    UnknownSource {
        /// The source identifier that is not registered
        source: String,
    },

    /// A start request was rejected because an operation is already active
    #[error("operation {operation_id} is already running")]
    AlreadyRunning {
        /// The identifier of the currently active operation
        operation_id: OperationId,
    },

    /// The referenced operation or schedule does not exist / is not active
    #[error("not found: {0}")]
    NotFound(String),

    /// A cron expression failed to parse
    #[error("invalid cron expression '{expression}': {message}")]
    InvalidCron {
        /// The offending expression
        expression: String,
        /// Parser error detail
        message: String,
    },

    /// Shutdown in progress - not accepting new operations
    #[error("shutdown in progress: not accepting new operations")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServer(String),
}

/// Task-level scrape failure taxonomy
///
/// Every `SourceScraper` implementation classifies its own failures into one
/// of these variants. Classification drives retry behavior: transient and
/// timeout errors are retried (up to the attempt bound), permanent errors
/// and cancellation are not.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transient failure (network hiccup, provider overloaded, rate limit)
    #[error("transient scrape failure: {0}")]
    Transient(String),

    /// A single attempt exceeded its deadline
    #[error("scrape attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Permanent failure (broken selector configuration, provider redesign)
    #[error("permanent scrape failure: {0}")]
    Permanent(String),

    /// The scraper observed cancellation and stopped early
    #[error("scrape cancelled")]
    Cancelled,
}

impl ScrapeError {
    /// Shorthand for a transient failure
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Shorthand for a permanent failure
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }
}

/// API error response format
///
/// Returned by API endpoints when an error occurs: a machine-readable code,
/// a human-readable message, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "already_running",
///     "message": "operation 0192… is already running",
///     "details": {
///       "operationId": "0192…"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "already_running")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create a "conflict" error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - invalid input
            Error::Config { .. } => 400,
            Error::EmptySources => 400,
            Error::UnknownSource { .. } => 400,
            Error::InvalidCron { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 409 Conflict - admission control rejected the start
            Error::AlreadyRunning { .. } => 409,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::ApiServer(_) => 500,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::EmptySources => "empty_sources",
            Error::UnknownSource { .. } => "unknown_source",
            Error::AlreadyRunning { .. } => "already_running",
            Error::NotFound(_) => "not_found",
            Error::InvalidCron { .. } => "invalid_cron",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::ApiServer(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::UnknownSource { source } => Some(serde_json::json!({
                "source": source,
            })),
            Error::AlreadyRunning { operation_id } => Some(serde_json::json!({
                "operationId": operation_id,
            })),
            Error::InvalidCron { expression, .. } => Some(serde_json::json!({
                "expression": expression,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
