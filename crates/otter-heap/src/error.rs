//! Error types for otter-heap

use thiserror::Error;

use crate::object::{ClassId, ObjectId};

/// Snapshot construction error
#[derive(Debug, Error)]
pub enum HeapError {
    /// A class with this name was already defined
    #[error("Duplicate class: {0}")]
    DuplicateClass(String),

    /// Class id not in the class table
    #[error("Unknown class id {0:?}")]
    UnknownClass(ClassId),

    /// Object id not in the object table
    #[error("Unknown object {0}")]
    UnknownObject(ObjectId),

    /// No field with this name
    #[error("Class {class} has no field {field}")]
    UnknownField {
        /// Class name
        class: String,
        /// Requested field
        field: String,
    },

    /// Wrong number of field values for an instance
    #[error("Class {class} declares {expected} fields, got {actual}")]
    FieldCountMismatch {
        /// Class name
        class: String,
        /// Declared field count
        expected: usize,
        /// Supplied value count
        actual: usize,
    },

    /// Slot index past the end of the object
    #[error("Slot {index} out of bounds for {object} ({len} slots)")]
    SlotOutOfBounds {
        /// Object
        object: ObjectId,
        /// Requested slot
        index: usize,
        /// Slot count
        len: usize,
    },

    /// The class cannot be instantiated this way
    #[error("Wrong kind: {0}")]
    WrongKind(String),
}

impl HeapError {
    /// Create a wrong-kind error
    pub fn wrong_kind(msg: impl Into<String>) -> Self {
        Self::WrongKind(msg.into())
    }
}

/// Result type using HeapError
pub type HeapResult<T> = Result<T, HeapError>;
