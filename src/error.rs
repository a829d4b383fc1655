//! Error types for every layer, with HTTP status code mapping.
//!
//! The database layer distinguishes a missing session
//! ([`WriteError::NoConnection`]) from every other write failure because
//! only the former is recovered locally by the guarded writer. Everything
//! surfaces to HTTP through [`ServiceError`].

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Fixed payload returned with `503 Service Unavailable` for any
/// unrecovered write failure.
pub const UNAVAILABLE_MESSAGE: &str = "Cassandra unavailable";

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "read failed: row decode failed: ...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Unusable guarded-writer settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BreakerConfigError {
    /// The bulkhead would admit nothing.
    #[error("max_concurrent must be at least 1")]
    NoConcurrency,

    /// The rolling window has no buckets.
    #[error("rolling_buckets must be at least 1")]
    NoBuckets,

    /// Each bucket would be narrower than the clock resolution.
    #[error("rolling window {window:?} is too short for {buckets} buckets")]
    WindowTooShort {
        /// Configured window length.
        window: Duration,
        /// Configured bucket count.
        buckets: u32,
    },

    /// Error percentage outside `0..=100`.
    #[error("error_percent_threshold must be within 0..=100, got {0}")]
    ErrorPercent(u32),

    /// The write timeout is zero.
    #[error("timeout must be positive")]
    ZeroTimeout,
}

/// Failure to establish a database session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    /// No contact points were configured.
    #[error("no contact points configured")]
    NoContactPoints,

    /// The driver could not build a session (cluster unreachable, auth
    /// failure, unknown keyspace, ...).
    #[error("session setup failed: {0}")]
    Session(String),
}

/// Failure of a keyed write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// No session is installed or the driver has no usable connection.
    #[error("no connection to the cluster")]
    NoConnection,

    /// The statement was sent and rejected, or failed for any reason other
    /// than a missing connection.
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// A row did not match the expected `emps` shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row decode failed: {0}")]
pub struct DecodeError(pub String);

/// Failure of a read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// No session is installed or the driver has no usable connection.
    #[error("no connection to the cluster")]
    NoConnection,

    /// The query itself failed.
    #[error("query failed: {0}")]
    Query(String),

    /// A returned row could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Outcome of a guarded write that did not succeed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    /// The breaker is open (or half-open with its trial in flight).
    #[error("circuit '{name}' is open")]
    CircuitOpen {
        /// Command name of the rejecting breaker.
        name: String,
    },

    /// The bulkhead has no free slot.
    #[error("bulkhead is full: max concurrent calls ({max_concurrent}) reached")]
    BulkheadFull {
        /// Maximum concurrent calls allowed.
        max_concurrent: usize,
    },

    /// The write did not finish within the breaker timeout.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// Reconnecting after a lost session failed.
    #[error("reconnect failed: {0}")]
    Connection(#[from] ConnectionError),

    /// The write (or its single retry) failed.
    #[error("write failed: {0}")]
    Write(#[from] WriteError),

    /// The write task ended without reporting an outcome.
    #[error("write task aborted: {0}")]
    Aborted(String),
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | Not Found       | 404 Not Found                |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 5000–5999 | Availability    | 503 Service Unavailable      |
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No employee with the given id.
    #[error("employee not found: {0}")]
    EmployeeNotFound(String),

    /// A guarded write failed or was rejected.
    #[error("write unavailable: {0}")]
    Unavailable(#[from] GuardError),

    /// A read against the store failed.
    #[error("read failed: {0}")]
    Read(#[from] ReadError),
}

impl ServiceError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::EmployeeNotFound(_) => 2001,
            Self::Read(_) => 3001,
            Self::Unavailable(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::EmployeeNotFound(_) => StatusCode::NOT_FOUND,
            Self::Read(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if matches!(self, Self::Unavailable(_)) {
            return (status, axum::Json(UNAVAILABLE_MESSAGE)).into_response();
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
