//! Error types for otter-overhead

use thiserror::Error;

/// Reasons a collection class cannot be described
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// None of the accepted names for a logical field exist
    #[error("Class {class} has none of the fields {candidates}")]
    MissingField {
        /// Class name
        class: String,
        /// Accepted names, `|`-separated
        candidates: String,
    },

    /// A field exists but has an unexpected type
    #[error("Field {class}.{field} has unexpected type")]
    FieldType {
        /// Class name
        class: String,
        /// Field name
        field: String,
    },

    /// A required implementation class is absent from the snapshot
    #[error("Implementation class {0} not found")]
    MissingClass(String),

    /// The object is not an array
    #[error("Object of class {0} is not an array")]
    NotAnArray(String),
}

impl DescriptorError {
    /// Create a missing-field error
    pub fn missing_field(class: impl Into<String>, candidates: &[&str]) -> Self {
        Self::MissingField {
            class: class.into(),
            candidates: candidates.join("|"),
        }
    }
}

/// Result type using DescriptorError
pub type OverheadResult<T> = Result<T, DescriptorError>;
