//! Error types for the griddle crate.

use thiserror::Error;

/// Errors that reject a data source request.
///
/// Every error is raised while compiling the request, before any record is
/// evaluated, so a failed request never yields partial results.
#[derive(Debug, Error)]
pub enum GridError {
    /// The record type has no field with this name.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    /// The operator or aggregate function does not apply to the field.
    #[error("operator '{operator}' is not supported for field '{field}'")]
    UnsupportedOperator { operator: String, field: String },

    /// The request is structurally invalid.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The request JSON could not be decoded.
    #[error("invalid request json: {0}")]
    Json(#[from] serde_json::Error),
}

impl GridError {
    pub(crate) fn unknown_field(field: impl Into<String>) -> Self {
        GridError::UnknownField {
            field: field.into(),
        }
    }

    pub(crate) fn unsupported(operator: impl Into<String>, field: impl Into<String>) -> Self {
        GridError::UnsupportedOperator {
            operator: operator.into(),
            field: field.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        GridError::MalformedRequest(message.into())
    }
}

/// Result type for griddle operations.
pub type Result<T> = std::result::Result<T, GridError>;
