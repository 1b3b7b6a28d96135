//! Descriptor factories: one per collection class

use std::sync::Arc;

use otter_heap::{ClassId, HeapModel, ObjectId};

use crate::class_desc::{ClassDescriptor, ClassFacts};
use crate::descriptor::InstanceDescriptor;
use crate::layout::{ExtraFields, resolve_mod_count};
use crate::shapes::Shape;

/// Layout of one collection class, resolved once against the snapshot
#[derive(Debug)]
pub struct DescriptorFactory {
    class: Arc<ClassDescriptor>,
    shape: Shape,
    default_capacity: usize,
    mod_count: Option<usize>,
    /// Fields the shape reads
    known_fields: Vec<usize>,
    extra_fields: ExtraFields,
}

/// What the registry resolved for a collection class
pub(crate) struct FactorySpec {
    pub(crate) facts: ClassFacts,
    pub(crate) shape: Shape,
    pub(crate) default_capacity: usize,
    /// Fields the shape reads
    pub(crate) known_fields: Vec<usize>,
    /// Set when the shape reads its counter elsewhere than `modCount`
    pub(crate) mod_count_override: Option<bool>,
}

impl DescriptorFactory {
    pub(crate) fn new(model: &dyn HeapModel, class: ClassId, spec: FactorySpec, banned_fields: &[usize]) -> Self {
        let heap_class = model.class(class);
        let mod_count = resolve_mod_count(heap_class);
        let mut facts = spec.facts;
        facts.can_determine_mod_count = spec.mod_count_override.unwrap_or(mod_count.is_some());
        let extra_fields = ExtraFields::compute(heap_class, &spec.known_fields, banned_fields);
        Self {
            class: Arc::new(ClassDescriptor::new(class, heap_class.name(), facts)),
            shape: spec.shape,
            default_capacity: spec.default_capacity,
            mod_count,
            known_fields: spec.known_fields,
            extra_fields,
        }
    }

    /// Same layout for a subclass. Inherited fields keep their indices;
    /// fields the subclass adds may be extra.
    pub(crate) fn clone_for_subclass(
        &self,
        model: &dyn HeapModel,
        class: ClassId,
        banned_fields: &[usize],
    ) -> Self {
        let heap_class = model.class(class);
        Self {
            class: Arc::new(self.class.clone_for_subclass(class, heap_class.name())),
            shape: self.shape.clone(),
            default_capacity: self.default_capacity,
            mod_count: self.mod_count,
            known_fields: self.known_fields.clone(),
            extra_fields: ExtraFields::compute(heap_class, &self.known_fields, banned_fields),
        }
    }

    /// Descriptor for one instance of the class
    pub fn descriptor<'h>(self: &Arc<Self>, model: &'h dyn HeapModel, obj: ObjectId) -> InstanceDescriptor<'h> {
        InstanceDescriptor::new(model, Arc::clone(self), obj)
    }

    /// Facts and counters of the class
    pub fn class_descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Described class
    pub fn class(&self) -> ClassId {
        self.class.class()
    }

    /// Capacity of an instance created without a size hint
    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    /// Whether instances have reference fields the shape does not read
    pub fn has_extra_obj_fields(&self) -> bool {
        matches!(self.extra_fields, ExtraFields::Filter(_))
    }

    pub(crate) fn shape(&self) -> &Shape {
        &self.shape
    }

    pub(crate) fn mod_count_field(&self) -> Option<usize> {
        self.mod_count
    }

    pub(crate) fn extra_fields(&self) -> &ExtraFields {
        &self.extra_fields
    }
}
