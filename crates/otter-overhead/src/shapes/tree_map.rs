//! Red-black tree of entries

use std::ops::ControlFlow;
use std::sync::Arc;

use otter_heap::{HeapModel, HeapValue, ObjectId};

use super::hash_map::entry_pair;
use super::{CollectionShape, claim, count_value, object_array};
use crate::descriptor::InstanceDescriptor;
use crate::layout::{NodeFields, NodeLayouts};
use crate::visit::{ChainGuard, MapVisitor, emit_entry, enter};

/// Ordered tree map. Some old runtimes keep several pairs per node in
/// parallel `keys`/`values` arrays; such nodes have no `key` field.
#[derive(Debug, Clone)]
pub(crate) struct TreeMapShape {
    pub(crate) size: usize,
    pub(crate) root: usize,
    pub(crate) nodes: Arc<NodeLayouts>,
}

fn child(model: &dyn HeapModel, node: ObjectId, index: Option<usize>) -> Option<ObjectId> {
    index.and_then(|i| model.field(node, i).as_object())
}

fn parallel_array(model: &dyn HeapModel, node: ObjectId, index: Option<usize>) -> Option<(ObjectId, &[HeapValue])> {
    object_array(model, model.field(node, index?))
}

impl TreeMapShape {
    fn scan_parallel(
        model: &dyn HeapModel,
        fields: &NodeFields,
        node: ObjectId,
        v: &mut dyn MapVisitor,
    ) -> ControlFlow<()> {
        let mut keys: &[HeapValue] = &[];
        let mut values: &[HeapValue] = &[];
        if let Some((array, slots)) = parallel_array(model, node, fields.keys) {
            if !enter(v, array)? {
                return ControlFlow::Continue(());
            }
            keys = slots;
        }
        if let Some((array, slots)) = parallel_array(model, node, fields.values) {
            if !enter(v, array)? {
                return ControlFlow::Continue(());
            }
            values = slots;
        }
        for i in 0..keys.len().max(values.len()) {
            let key = keys.get(i).and_then(|slot| slot.as_object());
            let value = values.get(i).and_then(|slot| slot.as_object());
            if key.is_none() && value.is_none() {
                continue;
            }
            emit_entry(v, key, value)?;
        }
        ControlFlow::Continue(())
    }
}

impl CollectionShape for TreeMapShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        count_value(d.field(self.size))
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        let model = d.model();
        let mut size = claim(model, d.object());
        let mut stack: Vec<ObjectId> = d.object_field(self.root).into_iter().collect();
        while let Some(node) = stack.pop() {
            let node_size = claim(model, node);
            if node_size == 0 {
                continue;
            }
            size += node_size;
            let fields = self.nodes.of(model, node);
            if fields.is_parallel_arrays() {
                for index in [fields.keys, fields.values] {
                    if let Some((array, _)) = parallel_array(model, node, index) {
                        size += claim(model, array);
                    }
                }
            }
            stack.extend(child(model, node, fields.right));
            stack.extend(child(model, node, fields.left));
        }
        size
    }

    fn iterate_map(&self, d: &InstanceDescriptor<'_>, v: &mut dyn MapVisitor) -> ControlFlow<()> {
        let model = d.model();
        let mut guard = ChainGuard::new();
        let mut stack: Vec<ObjectId> = d.object_field(self.root).into_iter().collect();
        while let Some(node) = stack.pop() {
            if !guard.first_visit(node) || !enter(v, node)? {
                continue;
            }
            let fields = self.nodes.of(model, node);
            if fields.is_parallel_arrays() {
                Self::scan_parallel(model, &fields, node, v)?;
            } else {
                let (key, value) = entry_pair(model, &fields, node);
                emit_entry(v, key, value)?;
            }
            stack.extend(child(model, node, fields.right));
            stack.extend(child(model, node, fields.left));
        }
        ControlFlow::Continue(())
    }
}
