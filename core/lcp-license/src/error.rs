//! Error types for license handling.

use lcp_types::{Status, StatusCode};
use thiserror::Error;

/// License-specific errors raised below the public `Status` boundary.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// License JSON is malformed or misses required fields.
    #[error("invalid license document: {0}")]
    InvalidDocument(String),

    /// Status document JSON is malformed.
    #[error("invalid status document: {0}")]
    InvalidStatusDocument(String),

    /// A timestamp field could not be parsed.
    #[error("invalid timestamp in {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: String },

    /// Service configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Maps the error to the closest status code, keeping the detail.
    #[must_use]
    pub fn into_status(self) -> Status {
        let code = match self {
            Self::InvalidDocument(_) | Self::InvalidTimestamp { .. } | Self::Serialization(_) => {
                StatusCode::LicenseMalformed
            }
            Self::InvalidStatusDocument(_) => StatusCode::StatusDocumentNotValid,
            Self::Config(_) | Self::Io(_) => StatusCode::CommonError,
        };
        Status::with_context(code, self)
    }
}

impl From<LicenseError> for Status {
    fn from(err: LicenseError) -> Self {
        err.into_status()
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
