//! Error types for core domain operations

use thiserror::Error;

/// Request validation errors.
///
/// These are client-fixable: the request itself was malformed before any
/// infrastructure was touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
        }
    }
}
