//! Error handling and custom error types
//!
//! Every failure surfaced by the node is normalized into [`Error`], whose
//! `Display` output is the human-readable message handed back to the host.

use std::time::Duration;
use thiserror::Error;

/// Machine-readable error codes returned by the ModelScope API in
/// `error.code`, plus the status-derived categories used when no code is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    InvalidToken,
    QuotaExceeded,
    RateLimitExceeded,
    ModelNotAvailable,
    TaskTimeout,
    InvalidParameter,
    InternalError,
    Other,
}

impl ApiErrorKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "INVALID_TOKEN" => Some(Self::InvalidToken),
            "QUOTA_EXCEEDED" => Some(Self::QuotaExceeded),
            "RATE_LIMIT_EXCEEDED" => Some(Self::RateLimitExceeded),
            "MODEL_NOT_AVAILABLE" => Some(Self::ModelNotAvailable),
            "TASK_TIMEOUT" => Some(Self::TaskTimeout),
            "INVALID_PARAMETER" => Some(Self::InvalidParameter),
            "INTERNAL_ERROR" => Some(Self::InternalError),
            _ => None,
        }
    }

    /// Canonical message for this category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidToken => "Authentication failed: API token is invalid or expired",
            Self::QuotaExceeded => {
                "Quota exhausted, upgrade your plan or wait for the daily reset"
            }
            Self::RateLimitExceeded => "Rate limit exceeded, please retry later",
            Self::ModelNotAvailable => "Model is unavailable or does not exist",
            Self::TaskTimeout => "Task processing timed out",
            Self::InvalidParameter => "Invalid request parameter",
            Self::InternalError => "Internal server error",
            Self::Other => "API call failed",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{message}")]
    Api {
        kind: ApiErrorKind,
        status: u16,
        message: String,
    },

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("{context} request timed out after {}ms", timeout.as_millis())]
    RequestTimeout {
        context: &'static str,
        timeout: Duration,
    },

    #[error(
        "Task processing timed out: gave up waiting after {timeout_minutes} minute(s) \
         (task ID: {task_id}, elapsed: {elapsed_secs}s); the task may still be running remotely"
    )]
    PollTimeout {
        task_id: String,
        timeout_minutes: u32,
        elapsed_secs: u64,
    },

    #[error("Image generation failed: {0}")]
    TaskFailed(String),

    #[error("Task submission failed: no task ID returned")]
    MissingTaskId,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn api(kind: ApiErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            kind,
            status,
            message: message.into(),
        }
    }

    /// The remote category for `Api` errors.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
