//! Collection shapes
//!
//! Each shape knows how one family of collection classes stores its
//! elements. A [`Shape`] carries the field indices resolved for a class;
//! the instance descriptor dispatches to it.

use std::ops::ControlFlow;

use otter_heap::{ClassId, HeapModel, HeapValue, ObjectId};

use crate::descriptor::InstanceDescriptor;
use crate::visit::{ListVisitor, MapVisitor};

mod array_list;
mod concurrent_map;
mod delegate;
mod hash_map;
mod linked;
mod segmented_map;
mod tree_map;

pub(crate) use array_list::{ArrayListShape, DequeShape, FullArrayShape, IdentityMapShape};
pub(crate) use concurrent_map::ConcurrentMapShape;
pub(crate) use delegate::DelegateShape;
pub(crate) use hash_map::HashMapShape;
pub(crate) use linked::LinkedShape;
pub(crate) use segmented_map::{SegmentFields, SegmentedMapShape};
pub(crate) use tree_map::TreeMapShape;

/// Per-shape algorithms
pub(crate) trait CollectionShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize;

    /// Bytes of the collection and implementation objects this call is the
    /// first to account for
    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64;

    fn sparseness_overhead(&self, _d: &InstanceDescriptor<'_>, _pointer_size: u32) -> Option<u64> {
        None
    }

    fn capacity(&self, _d: &InstanceDescriptor<'_>) -> Option<usize> {
        None
    }

    fn iterate_list(&self, _d: &InstanceDescriptor<'_>, _v: &mut dyn ListVisitor) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn iterate_map(&self, _d: &InstanceDescriptor<'_>, _v: &mut dyn MapVisitor) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn mod_count(&self, d: &InstanceDescriptor<'_>) -> Option<i64> {
        let index = d.factory().mod_count_field()?;
        Some(d.field(index).as_long().unwrap_or(0))
    }
}

/// Resolved layout of a collection class
#[derive(Debug, Clone)]
pub(crate) enum Shape {
    ArrayList(ArrayListShape),
    FullArray(FullArrayShape),
    Deque(DequeShape),
    IdentityMap(IdentityMapShape),
    HashMap(HashMapShape),
    Linked(LinkedShape),
    TreeMap(TreeMapShape),
    SegmentedMap(SegmentedMapShape),
    ConcurrentMap(ConcurrentMapShape),
    Delegate(DelegateShape),
}

impl Shape {
    pub(crate) fn ops(&self) -> &dyn CollectionShape {
        match self {
            Shape::ArrayList(s) => s,
            Shape::FullArray(s) => s,
            Shape::Deque(s) => s,
            Shape::IdentityMap(s) => s,
            Shape::HashMap(s) => s,
            Shape::Linked(s) => s,
            Shape::TreeMap(s) => s,
            Shape::SegmentedMap(s) => s,
            Shape::ConcurrentMap(s) => s,
            Shape::Delegate(s) => s,
        }
    }
}

/// Shallow size of `obj` if this call is the first to account for it
pub(crate) fn claim(model: &dyn HeapModel, obj: ObjectId) -> u64 {
    if model.mark_collection_impl(obj) {
        model.shallow_size(obj)
    } else {
        0
    }
}

/// Whether `class` is `ancestor` or inherits from it
pub(crate) fn is_kind_of(model: &dyn HeapModel, class: ClassId, ancestor: ClassId) -> bool {
    let mut current = Some(class);
    while let Some(c) = current {
        if c == ancestor {
            return true;
        }
        current = model.class(c).superclass();
    }
    false
}

/// A stored element count; negative or non-integral reads as zero
pub(crate) fn count_value(value: HeapValue) -> usize {
    value.as_long().map_or(0, |v| v.max(0) as usize)
}

/// An object array and its elements
pub(crate) fn object_array(model: &dyn HeapModel, value: HeapValue) -> Option<(ObjectId, &[HeapValue])> {
    let array = value.as_object()?;
    if !model.is_object_array(array) {
        return None;
    }
    Some((array, model.slots(array)))
}

/// Occupied slots
pub(crate) fn non_null(slots: &[HeapValue]) -> usize {
    slots.iter().filter(|s| !s.is_null()).count()
}

/// `(capacity - live) * pointer_size` when fewer than half the slots are live
pub(crate) fn sparse_slots(capacity: usize, live: usize, pointer_size: u32) -> Option<u64> {
    if live < capacity / 2 {
        Some((capacity - live) as u64 * u64::from(pointer_size))
    } else {
        None
    }
}
