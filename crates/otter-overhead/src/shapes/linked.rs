//! Singly or doubly linked node chains

use std::ops::ControlFlow;
use std::sync::Arc;

use otter_heap::ObjectId;

use super::hash_map::chain_next;
use super::{CollectionShape, claim, count_value};
use crate::descriptor::InstanceDescriptor;
use crate::layout::NodeLayouts;
use crate::visit::{ChainGuard, ListVisitor, emit_element, enter};

/// Linked list or queue
#[derive(Debug, Clone)]
pub(crate) struct LinkedShape {
    /// Stored element count; counted by walking when absent
    pub(crate) size: Option<usize>,
    pub(crate) root: usize,
    /// The root node is a sentinel that never holds an element
    pub(crate) sentinel: bool,
    pub(crate) nodes: Arc<NodeLayouts>,
}

impl LinkedShape {
    /// Visit nodes from the root until the chain ends, turns back, or `f`
    /// returns `Continue(false)`. The flag passed to `f` is false for the
    /// sentinel.
    fn for_each_node(
        &self,
        d: &InstanceDescriptor<'_>,
        mut f: impl FnMut(ObjectId, bool) -> ControlFlow<(), bool>,
    ) -> ControlFlow<()> {
        let model = d.model();
        let Some(root) = d.object_field(self.root) else {
            return ControlFlow::Continue(());
        };
        let mut guard = ChainGuard::new();
        let mut node = root;
        let mut holds_element = !self.sentinel;
        loop {
            if !guard.first_visit(node) || !f(node, holds_element)? {
                break;
            }
            holds_element = true;
            match chain_next(model, &self.nodes.of(model, node), node) {
                Some(next) => node = next,
                None => break,
            }
        }
        ControlFlow::Continue(())
    }

    fn element(&self, d: &InstanceDescriptor<'_>, node: ObjectId) -> Option<ObjectId> {
        let model = d.model();
        let index = self.nodes.of(model, node).element?;
        model.field(node, index).as_object()
    }
}

impl CollectionShape for LinkedShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        if let Some(size) = self.size {
            return count_value(d.field(size));
        }
        let mut count = 0;
        let _ = self.for_each_node(d, |node, holds_element| {
            if holds_element && self.element(d, node).is_some() {
                count += 1;
            }
            ControlFlow::Continue(true)
        });
        count
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        let model = d.model();
        let mut size = claim(model, d.object());
        let _ = self.for_each_node(d, |node, _| {
            let node_size = claim(model, node);
            size += node_size;
            ControlFlow::Continue(node_size > 0)
        });
        size
    }

    fn iterate_list(&self, d: &InstanceDescriptor<'_>, v: &mut dyn ListVisitor) -> ControlFlow<()> {
        self.for_each_node(d, |node, holds_element| {
            if !enter(v, node)? {
                return ControlFlow::Continue(false);
            }
            if holds_element {
                if let Some(element) = self.element(d, node) {
                    emit_element(v, element)?;
                }
            }
            ControlFlow::Continue(true)
        })
    }
}
