//! Arrays referenced directly from ordinary objects

use std::cell::OnceCell;
use std::sync::Arc;

use otter_heap::{HeapModel, ObjectId};

use crate::class_desc::ClassDescriptor;
use crate::shapes::{claim, non_null};

/// An array viewed as a degenerate collection whose slots are its elements
pub struct StandaloneArray<'h> {
    model: &'h dyn HeapModel,
    array: ObjectId,
    class: Arc<ClassDescriptor>,
    impl_size: OnceCell<u64>,
}

impl<'h> StandaloneArray<'h> {
    pub(crate) fn new(model: &'h dyn HeapModel, array: ObjectId, class: Arc<ClassDescriptor>) -> Self {
        Self {
            model,
            array,
            class,
            impl_size: OnceCell::new(),
        }
    }

    /// The array object
    pub fn object(&self) -> ObjectId {
        self.array
    }

    /// Counters shared by every array of this class
    pub fn class_descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Array length
    pub fn num_elements(&self) -> usize {
        self.model.array_length(self.array).unwrap_or(0)
    }

    /// Null slots; zero for primitive arrays
    pub fn num_null_slots(&self) -> usize {
        if !self.model.is_object_array(self.array) {
            return 0;
        }
        let slots = self.model.slots(self.array);
        slots.len() - non_null(slots)
    }

    /// Shallow size, counted once across all descriptors
    pub fn impl_size(&self) -> u64 {
        *self.impl_size.get_or_init(|| claim(self.model, self.array))
    }

    /// Bytes held by null slots when more than half, but not all, of them
    /// are null
    pub fn sparseness_overhead(&self, pointer_size: u32) -> Option<u64> {
        let len = self.num_elements();
        let nulls = self.num_null_slots();
        if nulls > len / 2 && nulls < len {
            Some(nulls as u64 * u64::from(pointer_size))
        } else {
            None
        }
    }
}

impl std::fmt::Debug for StandaloneArray<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandaloneArray")
            .field("class", &self.class.name())
            .field("object", &self.array)
            .finish()
    }
}
