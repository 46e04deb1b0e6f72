use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StfError {
    #[error("Invalid JSON input: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The SQL-proxy answered with a non-success HTTP status.
    #[error("SQL proxy returned HTTP {status}: {message}")]
    DatabaseStatus {
        status: u16,
        message: String,
        body: Option<Value>,
        retryable: bool,
        attempts: u32,
    },

    /// The SQL-proxy answered 2xx but the payload is an error shape.
    #[error("SQL proxy rejected statement: {message}")]
    DatabaseRejected { message: String, body: Value },

    /// Timeout or connection failure talking to an outbound dependency.
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        endpoint: String,
        message: String,
        timed_out: bool,
        attempts: u32,
    },

    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("invocation deadline of {0}s exceeded")]
    DeadlineExceeded(u64),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, StfError>;

impl StfError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StfError::Validation(msg.into())
    }

    /// Wire `type` tag reported in the Failure document.
    pub fn kind(&self) -> &'static str {
        match self {
            StfError::Parse(_) => "ParseError",
            StfError::Validation(_) | StfError::UnknownOperation(_) => "ValidationError",
            StfError::DatabaseStatus { .. } | StfError::DatabaseRejected { .. } => "DatabaseError",
            StfError::Transport { .. } | StfError::InvalidResponse { .. } => "ExternalAPIError",
            StfError::DeadlineExceeded(_) => "TimeoutError",
            StfError::Config(_) | StfError::Yaml(_) => "ConfigError",
            StfError::Io(_) => "IOError",
            StfError::Internal(_) => "InternalError",
        }
    }

    /// Whether a caller may reasonably retry the whole invocation.
    pub fn is_retryable(&self) -> bool {
        match self {
            StfError::DatabaseStatus { retryable, .. } => *retryable,
            StfError::Transport { .. } => true,
            _ => false,
        }
    }

    /// Structured context for the Failure document, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            StfError::DatabaseStatus {
                status,
                body,
                retryable,
                attempts,
                ..
            } => Some(json!({
                "status": status,
                "body": body,
                "retryable": retryable,
                "attempts": attempts,
            })),
            StfError::DatabaseRejected { body, .. } => Some(json!({
                "body": body,
                "retryable": false,
            })),
            StfError::Transport {
                endpoint,
                timed_out,
                attempts,
                ..
            } => Some(json!({
                "endpoint": endpoint,
                "timed_out": timed_out,
                "retryable": true,
                "attempts": attempts,
            })),
            StfError::InvalidResponse { endpoint, .. } => Some(json!({
                "endpoint": endpoint,
                "retryable": false,
            })),
            _ => None,
        }
    }
}
