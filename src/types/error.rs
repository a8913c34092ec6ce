//! Error types for Sideline
//!
//! Three layers:
//! - [`FetchError`] - typed failure of one aggregator call, renderable to consumers
//! - [`SubscribeError`] - failure to open a change-bus subscription (non-fatal)
//! - [`SidelineError`] - crate-level error for configuration, handles and the HTTP surface

use hyper::StatusCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Failure of a single aggregator fetch.
///
/// Returned as a value, never thrown, so the controller can match on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Transport failure reaching the aggregation endpoint (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// The subject does not exist (non-retryable, clears the snapshot)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The endpoint answered with an error status or error envelope (retryable)
    #[error("Server error: {0}")]
    ServerError(String),

    /// The request did not complete within the configured timeout (retryable)
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl FetchError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::ServerError(_) => "server_error",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Whether a manual retry can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }

    /// Whether this error invalidates the last good snapshot
    pub fn clears_snapshot(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Fixed, renderable message for consumers.
    ///
    /// Detail strings from the transport stay in `Display` and the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Unable to reach the dashboard service",
            Self::NotFound(_) => "Player not found",
            Self::ServerError(_) => "The dashboard service returned an error",
            Self::Timeout(_) => "The dashboard service took too long to respond",
        }
    }
}

impl Serialize for FetchError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FetchError", 4)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", self.user_message())?;
        state.serialize_field("detail", &self.to_string())?;
        state.serialize_field("retryable", &self.is_retryable())?;
        state.end()
    }
}

/// Failure to open a subscription on the change bus
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    #[error("Subscribe to {topic} rejected: {reason}")]
    Rejected { topic: String, reason: String },

    #[error("Change bus unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for Sideline operations
#[derive(Debug, thiserror::Error)]
pub enum SidelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid subject id: {0:?}")]
    InvalidSubject(String),

    #[error("Dashboard controller has shut down")]
    ControllerClosed,

    #[error("Change bus error: {0}")]
    Bus(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SidelineError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidSubject(_) => StatusCode::BAD_REQUEST,
            Self::ControllerClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Bus(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Fetch(FetchError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Fetch(FetchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Fetch(_) => StatusCode::BAD_GATEWAY,
            Self::Http(_) => StatusCode::BAD_REQUEST,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

impl From<SubscribeError> for SidelineError {
    fn from(err: SubscribeError) -> Self {
        Self::Bus(err.to_string())
    }
}

impl From<std::io::Error> for SidelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SidelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for SidelineError {
    fn from(err: hyper::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Result type alias for Sideline operations
pub type Result<T> = std::result::Result<T, SidelineError>;
