//! Error types of the metadata service.

use crate::metadata::{InvalidFieldValue, MetadataField, UnknownFieldName};
use std::fmt;
use thiserror::Error;

/// A mutation that can never be applied, detected before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    UnknownField {
        name: String,
    },
    /// A value supplied together with `locked = false`.
    ValueWithoutLock {
        field: MetadataField,
    },
    InvalidNumber {
        field: MetadataField,
        value: String,
    },
    NegativeNumber {
        field: MetadataField,
        value: String,
    },
    EmptyField {
        field: &'static str,
    },
    EmptyBatch,
    /// Two batch keys naming the same field.
    DuplicateField {
        field: MetadataField,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownField { name } => {
                write!(f, "Unknown metadata field '{}'", name)
            }
            ValidationError::ValueWithoutLock { field } => {
                write!(
                    f,
                    "Field '{}' cannot carry a value while unlocked",
                    field
                )
            }
            ValidationError::InvalidNumber { field, value } => {
                write!(f, "Field '{}' expects a number, got '{}'", field, value)
            }
            ValidationError::NegativeNumber { field, value } => {
                write!(f, "Field '{}' must be non-negative, got {}", field, value)
            }
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
            ValidationError::EmptyBatch => write!(f, "Batch contains no fields"),
            ValidationError::DuplicateField { field } => {
                write!(f, "Field '{}' appears more than once in the batch", field)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<UnknownFieldName> for ValidationError {
    fn from(e: UnknownFieldName) -> Self {
        ValidationError::UnknownField { name: e.0 }
    }
}

impl From<InvalidFieldValue> for ValidationError {
    fn from(e: InvalidFieldValue) -> Self {
        if e.reason == "must be non-negative" {
            ValidationError::NegativeNumber {
                field: e.field,
                value: e.value,
            }
        } else {
            ValidationError::InvalidNumber {
                field: e.field,
                value: e.value,
            }
        }
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Catalog item not found: {0}")]
    ItemNotFound(String),

    #[error("No record {external_id} at provider {provider}")]
    AgentNotFound {
        provider: String,
        external_id: String,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl MetadataError {
    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MetadataError::Provider(_))
    }
}
