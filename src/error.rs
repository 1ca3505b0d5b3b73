use thiserror::Error;

use crate::models::MAX_PAIRS;

/// Failure talking to the backend. `Backend` carries the human-readable
/// `detail` field verbatim; transport covers timeouts, refused connections
/// and body decode failures alike.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{detail}")]
    Backend { status: u16, detail: String },
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Backend { status, .. } => *status >= 500,
        }
    }
}

/// Rejected before any network call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("select at least one pair")]
    NoPairs,
    #[error("at most {MAX_PAIRS} pairs can be scanned at once (got {0})")]
    TooManyPairs(usize),
    #[error("invalid value for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("{field} must be at least {min}")]
    BelowMinimum { field: &'static str, min: u32 },
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum StopError {
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Local preference storage failure. Never fatal: callers degrade to
/// in-memory state.
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("preference store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference store encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}
