//! Per-instance view of a collection

use std::cell::OnceCell;
use std::ops::ControlFlow;
use std::sync::Arc;

use otter_heap::{HeapModel, HeapValue, ObjectId};

use crate::class_desc::ClassDescriptor;
use crate::factory::DescriptorFactory;
use crate::layout::ExtraFields;
use crate::visit::{ElementSampler, EntrySampler, ListVisitor, MapVisitor};

/// One collection object together with the layout of its class.
///
/// Counts and sizes are computed on first request and memoized. Computing
/// the implementation size flags every object it accounts for, so a size
/// already claimed by another descriptor is not counted again.
pub struct InstanceDescriptor<'h> {
    model: &'h dyn HeapModel,
    factory: Arc<DescriptorFactory>,
    obj: ObjectId,
    num_elements: OnceCell<usize>,
    impl_size: OnceCell<u64>,
}

impl<'h> InstanceDescriptor<'h> {
    pub(crate) fn new(model: &'h dyn HeapModel, factory: Arc<DescriptorFactory>, obj: ObjectId) -> Self {
        Self {
            model,
            factory,
            obj,
            num_elements: OnceCell::new(),
            impl_size: OnceCell::new(),
        }
    }

    pub(crate) fn model(&self) -> &'h dyn HeapModel {
        self.model
    }

    pub(crate) fn factory(&self) -> &DescriptorFactory {
        &self.factory
    }

    pub(crate) fn field(&self, index: usize) -> HeapValue {
        self.model.field(self.obj, index)
    }

    pub(crate) fn object_field(&self, index: usize) -> Option<ObjectId> {
        self.field(index).as_object()
    }

    /// The collection object
    pub fn object(&self) -> ObjectId {
        self.obj
    }

    /// Facts and counters of the collection's class
    pub fn class_descriptor(&self) -> &Arc<ClassDescriptor> {
        self.factory.class_descriptor()
    }

    /// Number of live elements (pairs for maps).
    ///
    /// Where the class stores a size, that size is returned as is. It counts
    /// null elements, which traversals never offer.
    pub fn num_elements(&self) -> usize {
        *self
            .num_elements
            .get_or_init(|| self.factory.shape().ops().num_elements(self))
    }

    /// Shallow size of the collection plus every implementation object it
    /// was the first to account for
    pub fn impl_size(&self) -> u64 {
        *self
            .impl_size
            .get_or_init(|| self.factory.shape().ops().impl_size(self))
    }

    /// Bytes wasted on empty slots, or `None` if not sparse.
    ///
    /// Sparse means fewer than half of the slots are in use.
    pub fn sparseness_overhead(&self, pointer_size: u32) -> Option<u64> {
        self.factory
            .shape()
            .ops()
            .sparseness_overhead(self, pointer_size)
    }

    /// Slots currently allocated, for array-backed shapes
    pub fn capacity(&self) -> Option<usize> {
        self.factory.shape().ops().capacity(self)
    }

    /// Capacity of a collection created without a size hint
    pub fn default_capacity(&self) -> usize {
        self.factory.default_capacity()
    }

    /// Offer implementation objects and then elements to `visitor`.
    ///
    /// # Panics
    ///
    /// Panics if the collection is a map.
    pub fn iterate_list(&self, visitor: &mut dyn ListVisitor) {
        assert!(
            !self.class_descriptor().is_map(),
            "iterate_list called on map {}",
            self.class_descriptor().name()
        );
        let _ = self.walk_list(visitor);
    }

    /// Offer implementation objects and then key/value pairs to `visitor`.
    ///
    /// # Panics
    ///
    /// Panics if the collection is not a map.
    pub fn iterate_map(&self, visitor: &mut dyn MapVisitor) {
        assert!(
            self.class_descriptor().is_map(),
            "iterate_map called on non-map {}",
            self.class_descriptor().name()
        );
        let _ = self.walk_map(visitor);
    }

    pub(crate) fn walk_list(&self, visitor: &mut dyn ListVisitor) -> ControlFlow<()> {
        self.factory.shape().ops().iterate_list(self, visitor)
    }

    pub(crate) fn walk_map(&self, visitor: &mut dyn MapVisitor) -> ControlFlow<()> {
        self.factory.shape().ops().iterate_map(self, visitor)
    }

    /// The modification counter.
    ///
    /// # Panics
    ///
    /// Panics unless [`ClassDescriptor::can_determine_mod_count`] holds.
    pub fn mod_count(&self) -> i64 {
        match self.factory.shape().ops().mod_count(self) {
            Some(count) => count,
            None => panic!(
                "mod count of {} cannot be determined",
                self.class_descriptor().name()
            ),
        }
    }

    /// An element, if the first few elements all share a runtime class
    pub fn sample_element(&self) -> Option<ObjectId> {
        let mut sampler = ElementSampler::new(self.model);
        self.iterate_list(&mut sampler);
        sampler.result()
    }

    /// A key, if the first few non-null keys share a class, and likewise a
    /// value; each side is sampled on its own
    pub fn sample_key_and_value(&self) -> (Option<ObjectId>, Option<ObjectId>) {
        let mut sampler = EntrySampler::new(self.model);
        self.iterate_map(&mut sampler);
        sampler.result()
    }

    /// Whether the collection object has reference fields the descriptor
    /// does not account for
    pub fn has_extra_obj_fields(&self) -> bool {
        matches!(self.factory.extra_fields(), ExtraFields::Filter(_))
    }

    /// Null out every field except the extra ones in a copy of the
    /// collection's fields, leaving what a reachability scan must still
    /// follow
    pub fn filter_extra_obj_fields(&self, fields: &mut [HeapValue]) {
        match self.factory.extra_fields() {
            ExtraFields::Filter(covered) => {
                for index in covered.iter() {
                    if let Some(slot) = fields.get_mut(*index) {
                        *slot = HeapValue::Null;
                    }
                }
            }
            ExtraFields::None => fields.fill(HeapValue::Null),
        }
    }

    /// Copy of the collection's fields with only the extra ones kept
    pub fn extra_obj_fields(&self) -> Vec<HeapValue> {
        let mut fields = self.model.slots(self.obj).to_vec();
        self.filter_extra_obj_fields(&mut fields);
        fields
    }
}

impl std::fmt::Debug for InstanceDescriptor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceDescriptor")
            .field("class", &self.class_descriptor().name())
            .field("object", &self.obj)
            .finish()
    }
}
