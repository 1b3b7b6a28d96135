//! Sets implemented by wrapping another collection

use std::ops::ControlFlow;
use std::sync::Arc;

use super::{CollectionShape, claim, is_kind_of};
use crate::descriptor::InstanceDescriptor;
use crate::factory::DescriptorFactory;
use crate::visit::{KeysAsElements, ListVisitor, enter};

/// Set backed by a map (elements are its keys) or by a list
#[derive(Debug, Clone)]
pub(crate) struct DelegateShape {
    /// Field referencing the wrapped collection
    pub(crate) field: usize,
    pub(crate) inner: Arc<DescriptorFactory>,
}

impl DelegateShape {
    /// The wrapped collection, if it has the layout the inner factory
    /// describes. Views such as sub-maps live in the same field but are laid
    /// out differently.
    fn inner<'h>(&self, d: &InstanceDescriptor<'h>) -> Option<InstanceDescriptor<'h>> {
        let model = d.model();
        let obj = d.object_field(self.field)?;
        if !is_kind_of(model, model.class_of(obj), self.inner.class()) {
            return None;
        }
        Some(self.inner.descriptor(model, obj))
    }
}

impl CollectionShape for DelegateShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        self.inner(d).map_or(0, |inner| inner.num_elements())
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        claim(d.model(), d.object()) + self.inner(d).map_or(0, |inner| inner.impl_size())
    }

    fn sparseness_overhead(&self, d: &InstanceDescriptor<'_>, pointer_size: u32) -> Option<u64> {
        self.inner(d)?.sparseness_overhead(pointer_size)
    }

    fn capacity(&self, d: &InstanceDescriptor<'_>) -> Option<usize> {
        self.inner(d)?.capacity()
    }

    fn iterate_list(&self, d: &InstanceDescriptor<'_>, v: &mut dyn ListVisitor) -> ControlFlow<()> {
        let Some(inner) = self.inner(d) else {
            return ControlFlow::Continue(());
        };
        if !enter(v, inner.object())? {
            return ControlFlow::Continue(());
        }
        if inner.class_descriptor().is_map() {
            inner.walk_map(&mut KeysAsElements { inner: v })
        } else {
            inner.walk_list(v)
        }
    }

    fn mod_count(&self, d: &InstanceDescriptor<'_>) -> Option<i64> {
        match self.inner(d) {
            Some(inner) if inner.class_descriptor().can_determine_mod_count() => {
                Some(inner.mod_count())
            }
            Some(_) => None,
            None => Some(0),
        }
    }
}
