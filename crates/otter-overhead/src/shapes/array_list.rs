//! Collections whose elements sit directly in one backing array

use std::ops::ControlFlow;

use otter_heap::{HeapValue, ObjectId};

use super::{CollectionShape, claim, count_value, object_array, sparse_slots};
use crate::descriptor::InstanceDescriptor;
use crate::visit::{ListVisitor, MapVisitor, emit_element, emit_entry, enter};

fn backing_array<'h>(d: &InstanceDescriptor<'h>, field: usize) -> Option<(ObjectId, &'h [HeapValue])> {
    object_array(d.model(), d.field(field))
}

fn array_impl_size(d: &InstanceDescriptor<'_>, field: usize) -> u64 {
    let model = d.model();
    let mut size = claim(model, d.object());
    if let Some((array, _)) = backing_array(d, field) {
        size += claim(model, array);
    }
    size
}

fn scan_elements<'a>(
    v: &mut dyn ListVisitor,
    slots: impl Iterator<Item = &'a HeapValue>,
) -> ControlFlow<()> {
    for slot in slots {
        if let Some(element) = slot.as_object() {
            emit_element(v, element)?;
        }
    }
    ControlFlow::Continue(())
}

/// Stored size plus a backing array that grows ahead of it
#[derive(Debug, Clone)]
pub(crate) struct ArrayListShape {
    pub(crate) size: usize,
    pub(crate) elements: usize,
}

impl CollectionShape for ArrayListShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        count_value(d.field(self.size))
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        array_impl_size(d, self.elements)
    }

    fn sparseness_overhead(&self, d: &InstanceDescriptor<'_>, pointer_size: u32) -> Option<u64> {
        let capacity = self.capacity(d)?;
        sparse_slots(capacity, d.num_elements(), pointer_size)
    }

    fn capacity(&self, d: &InstanceDescriptor<'_>) -> Option<usize> {
        backing_array(d, self.elements).map(|(_, slots)| slots.len())
    }

    fn iterate_list(&self, d: &InstanceDescriptor<'_>, v: &mut dyn ListVisitor) -> ControlFlow<()> {
        let Some((array, slots)) = backing_array(d, self.elements) else {
            return ControlFlow::Continue(());
        };
        if !enter(v, array)? {
            return ControlFlow::Continue(());
        }
        scan_elements(v, slots.iter())
    }
}

/// Backing array copied on every write, so always exactly full
#[derive(Debug, Clone)]
pub(crate) struct FullArrayShape {
    pub(crate) elements: usize,
}

impl CollectionShape for FullArrayShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        backing_array(d, self.elements).map_or(0, |(_, slots)| slots.len())
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        array_impl_size(d, self.elements)
    }

    fn iterate_list(&self, d: &InstanceDescriptor<'_>, v: &mut dyn ListVisitor) -> ControlFlow<()> {
        let Some((array, slots)) = backing_array(d, self.elements) else {
            return ControlFlow::Continue(());
        };
        if !enter(v, array)? {
            return ControlFlow::Continue(());
        }
        scan_elements(v, slots.iter())
    }
}

/// Circular buffer with head and tail indices
#[derive(Debug, Clone)]
pub(crate) struct DequeShape {
    pub(crate) elements: usize,
    pub(crate) head: usize,
    pub(crate) tail: usize,
}

impl DequeShape {
    fn live_range(&self, d: &InstanceDescriptor<'_>, len: usize) -> (usize, usize) {
        if len == 0 {
            return (0, 0);
        }
        let head = d.field(self.head).as_long().unwrap_or(0);
        let tail = d.field(self.tail).as_long().unwrap_or(0);
        let count = (tail - head).rem_euclid(len as i64) as usize;
        (head.rem_euclid(len as i64) as usize, count)
    }
}

impl CollectionShape for DequeShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        backing_array(d, self.elements).map_or(0, |(_, slots)| self.live_range(d, slots.len()).1)
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        array_impl_size(d, self.elements)
    }

    fn capacity(&self, d: &InstanceDescriptor<'_>) -> Option<usize> {
        backing_array(d, self.elements).map(|(_, slots)| slots.len())
    }

    fn iterate_list(&self, d: &InstanceDescriptor<'_>, v: &mut dyn ListVisitor) -> ControlFlow<()> {
        let Some((array, slots)) = backing_array(d, self.elements) else {
            return ControlFlow::Continue(());
        };
        if !enter(v, array)? {
            return ControlFlow::Continue(());
        }
        let (head, count) = self.live_range(d, slots.len());
        scan_elements(v, slots.iter().cycle().skip(head).take(count))
    }
}

/// Keys and values interleaved in one flat array
#[derive(Debug, Clone)]
pub(crate) struct IdentityMapShape {
    pub(crate) size: usize,
    pub(crate) table: usize,
}

impl CollectionShape for IdentityMapShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        count_value(d.field(self.size))
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        array_impl_size(d, self.table)
    }

    fn sparseness_overhead(&self, d: &InstanceDescriptor<'_>, pointer_size: u32) -> Option<u64> {
        let (_, slots) = backing_array(d, self.table)?;
        sparse_slots(slots.len(), 2 * d.num_elements(), pointer_size)
    }

    fn capacity(&self, d: &InstanceDescriptor<'_>) -> Option<usize> {
        backing_array(d, self.table).map(|(_, slots)| slots.len() / 2)
    }

    fn iterate_map(&self, d: &InstanceDescriptor<'_>, v: &mut dyn MapVisitor) -> ControlFlow<()> {
        let Some((table, slots)) = backing_array(d, self.table) else {
            return ControlFlow::Continue(());
        };
        if !enter(v, table)? {
            return ControlFlow::Continue(());
        }
        for pair in slots.chunks(2) {
            let key = pair[0];
            let value = pair.get(1).copied().unwrap_or(HeapValue::Null);
            if key.is_null() && value.is_null() {
                continue;
            }
            emit_entry(v, key.as_object(), value.as_object())?;
        }
        ControlFlow::Continue(())
    }
}
