//! Application-wide error types.

use foodshare_lifecycle::envelope::{EnvelopeError, FieldMessages};
use thiserror::Error;

/// Failure of a single API request, classified by what the caller should
/// do about it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response at all: connection refused, DNS, timeout.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// 401. The session has already been cleared when this is returned.
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: FieldMessages,
    },

    /// 409: claim race or a transition the backend refused.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected status {status}: {message}")]
    Unexpected { status: u16, message: String },

    #[error("Malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: EnvelopeError,
    },
}

impl ApiError {
    /// The request may or may not have taken effect on the backend.
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Server { .. } | Self::Decode { .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network(_) | Self::Decode { .. } => None,
            Self::Unauthenticated => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Validation { .. } => Some(422),
            Self::Conflict { .. } => Some(409),
            Self::Server { status, .. } | Self::Unexpected { status, .. } => Some(*status),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Id {0} does not fit the local store")]
    IdOutOfRange(u64),
}

pub type Result<T> = std::result::Result<T, ClientError>;
