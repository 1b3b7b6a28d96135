//! The object model consumed by heap analyses

use crate::class::{ClassKind, HeapClass};
use crate::heap::HeapConfig;
use crate::object::{ClassId, HeapValue, ObjectHeader, ObjectId};

/// Read access to a parsed heap snapshot.
///
/// Ids handed out by a model are always valid for that model; passing ids
/// from another model is a caller bug and may panic.
pub trait HeapModel: Send + Sync {
    /// Layout parameters of the dumped runtime
    fn config(&self) -> &HeapConfig;

    /// Number of classes; valid class ids are `0..class_count()`
    fn class_count(&self) -> usize;

    /// Class by id
    fn class(&self, id: ClassId) -> &HeapClass;

    /// Class by fully qualified name
    fn class_by_name(&self, name: &str) -> Option<ClassId>;

    /// Number of objects; valid object ids are `0..object_count()`
    fn object_count(&self) -> usize;

    /// Runtime class of an object
    fn class_of(&self, obj: ObjectId) -> ClassId;

    /// Instance fields in declaration order, or array elements
    fn slots(&self, obj: ObjectId) -> &[HeapValue];

    /// Length of an array object
    fn array_length(&self, obj: ObjectId) -> Option<usize>;

    /// Shallow size in bytes
    fn shallow_size(&self, obj: ObjectId) -> u64;

    /// Position of the object record in the dump
    fn file_offset(&self, obj: ObjectId) -> u64;

    /// Analysis flags
    fn header(&self, obj: ObjectId) -> &ObjectHeader;

    /// Name of the runtime class of an object
    fn class_name_of(&self, obj: ObjectId) -> &str {
        self.class(self.class_of(obj)).name()
    }

    /// Field or element at `index`; out of range reads as null
    fn field(&self, obj: ObjectId, index: usize) -> HeapValue {
        self.slots(obj).get(index).copied().unwrap_or(HeapValue::Null)
    }

    /// Most derived field called `name`
    fn field_by_name(&self, obj: ObjectId, name: &str) -> Option<HeapValue> {
        let index = self.class(self.class_of(obj)).field_index(name)?;
        Some(self.field(obj, index))
    }

    /// Whether the object is an array of references
    fn is_object_array(&self, obj: ObjectId) -> bool {
        self.class(self.class_of(obj)).kind() == ClassKind::ObjectArray
    }

    /// Whether the object is any array
    fn is_array(&self, obj: ObjectId) -> bool {
        self.class(self.class_of(obj)).is_array()
    }

    /// Flag the object as collection implementation; true if newly flagged
    fn mark_collection_impl(&self, obj: ObjectId) -> bool {
        self.header(obj).mark_collection_impl()
    }

    /// Whether the object was already accounted for
    fn is_collection_impl(&self, obj: ObjectId) -> bool {
        self.header(obj).is_collection_impl()
    }
}
