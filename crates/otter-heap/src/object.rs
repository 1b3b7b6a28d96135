//! Heap object layout: identities, field values and the per-object header

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Index of an object in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Create an id from a raw table index
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Raw table index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Index of a class in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    /// Create an id from a raw table index
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Raw table index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic field types of the dump format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Object reference
    Object,
    /// `boolean`
    Boolean,
    /// `char`
    Char,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `byte`
    Byte,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
}

impl FieldType {
    /// Size of a value of this type in bytes
    pub fn size(self, pointer_size: u32) -> u32 {
        match self {
            FieldType::Object => pointer_size,
            FieldType::Boolean | FieldType::Byte => 1,
            FieldType::Char | FieldType::Short => 2,
            FieldType::Float | FieldType::Int => 4,
            FieldType::Double | FieldType::Long => 8,
        }
    }

    /// Whether values of this type are references
    pub fn is_reference(self) -> bool {
        self == FieldType::Object
    }

    /// Signature character (`L`, `Z`, `C`, `F`, `D`, `B`, `S`, `I`, `J`)
    pub fn signature_char(self) -> char {
        match self {
            FieldType::Object => 'L',
            FieldType::Boolean => 'Z',
            FieldType::Char => 'C',
            FieldType::Float => 'F',
            FieldType::Double => 'D',
            FieldType::Byte => 'B',
            FieldType::Short => 'S',
            FieldType::Int => 'I',
            FieldType::Long => 'J',
        }
    }

    /// Default (zero) value of this type
    pub fn zero(self) -> HeapValue {
        match self {
            FieldType::Object => HeapValue::Null,
            FieldType::Boolean => HeapValue::Boolean(false),
            FieldType::Char => HeapValue::Char(0),
            FieldType::Float => HeapValue::Float(0.0),
            FieldType::Double => HeapValue::Double(0.0),
            FieldType::Byte => HeapValue::Byte(0),
            FieldType::Short => HeapValue::Short(0),
            FieldType::Int => HeapValue::Int(0),
            FieldType::Long => HeapValue::Long(0),
        }
    }
}

/// A materialized field or array slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeapValue {
    /// Null reference
    Null,
    /// Reference to an object present in the snapshot
    Object(ObjectId),
    /// Reference whose target is missing from the dump (raw id kept)
    Unresolved(u64),
    /// `boolean`
    Boolean(bool),
    /// `char`
    Char(u16),
    /// `byte`
    Byte(i8),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
}

impl HeapValue {
    /// Resolved object reference, if any. Unresolved references read as absent.
    pub fn as_object(self) -> Option<ObjectId> {
        match self {
            HeapValue::Object(id) => Some(id),
            _ => None,
        }
    }

    /// Integer value of an `int` slot
    pub fn as_int(self) -> Option<i32> {
        match self {
            HeapValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Integer value of an `int` or `long` slot
    pub fn as_long(self) -> Option<i64> {
        match self {
            HeapValue::Int(v) => Some(v as i64),
            HeapValue::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this is a null reference
    pub fn is_null(self) -> bool {
        matches!(self, HeapValue::Null)
    }

    /// Whether this slot holds a reference (resolved, unresolved or null)
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            HeapValue::Null | HeapValue::Object(_) | HeapValue::Unresolved(_)
        )
    }
}

/// Header flags
pub mod flags {
    /// Seen by a graph walk
    pub const VISITED: u8 = 0b001;
    /// Accounted for as part of some collection's implementation
    pub const COLLECTION_IMPL: u8 = 0b010;
    /// Free for other analyses
    pub const OTHER: u8 = 0b100;
}

/// Per-object header with atomic analysis flags
#[derive(Debug, Default)]
pub struct ObjectHeader {
    flags: AtomicU8,
}

impl ObjectHeader {
    /// Create a header with no flags set
    pub const fn new() -> Self {
        Self {
            flags: AtomicU8::new(0),
        }
    }

    /// Set `flag`; returns true if this call set it
    pub fn set_if_unset(&self, flag: u8) -> bool {
        self.flags.fetch_or(flag, Ordering::AcqRel) & flag == 0
    }

    /// Whether `flag` is set
    pub fn is_set(&self, flag: u8) -> bool {
        self.flags.load(Ordering::Acquire) & flag != 0
    }

    /// Clear `flag`
    pub fn clear(&self, flag: u8) {
        self.flags.fetch_and(!flag, Ordering::AcqRel);
    }

    /// Mark as part of a collection implementation; true if newly marked
    pub fn mark_collection_impl(&self) -> bool {
        self.set_if_unset(flags::COLLECTION_IMPL)
    }

    /// Whether some collection already accounted for this object
    pub fn is_collection_impl(&self) -> bool {
        self.is_set(flags::COLLECTION_IMPL)
    }

    /// Mark visited; true if newly marked
    pub fn mark_visited(&self) -> bool {
        self.set_if_unset(flags::VISITED)
    }

    /// Whether the object was visited
    pub fn is_visited(&self) -> bool {
        self.is_set(flags::VISITED)
    }

    /// Clear every flag
    pub fn reset(&self) {
        self.flags.store(0, Ordering::Release);
    }
}

impl Clone for ObjectHeader {
    fn clone(&self) -> Self {
        // Cloned header starts with no flags (fresh analysis state)
        Self::new()
    }
}
