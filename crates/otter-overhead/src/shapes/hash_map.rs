//! Bucket arrays of chained entries, optionally with tree bins

use std::ops::ControlFlow;
use std::sync::Arc;

use otter_heap::{HeapModel, ObjectId};

use super::{CollectionShape, claim, count_value, non_null, object_array, sparse_slots};
use crate::descriptor::InstanceDescriptor;
use crate::layout::{NodeFields, NodeLayouts};
use crate::visit::{ChainGuard, MapVisitor, emit_entry, enter, next_link};

/// Key and value of an entry
pub(crate) fn entry_pair(
    model: &dyn HeapModel,
    fields: &NodeFields,
    entry: ObjectId,
) -> (Option<ObjectId>, Option<ObjectId>) {
    let read = |index: Option<usize>| index.and_then(|i| model.field(entry, i).as_object());
    (read(fields.key), read(fields.value))
}

/// Successor of `node` through its `next` field
pub(crate) fn chain_next(model: &dyn HeapModel, fields: &NodeFields, node: ObjectId) -> Option<ObjectId> {
    let index = fields.next?;
    next_link(model, node, model.field(node, index))
}

/// Bytes of the chain starting at `head`, up to the first entry some walk
/// already accounted for
pub(crate) fn claim_chain(model: &dyn HeapModel, nodes: &NodeLayouts, head: ObjectId) -> u64 {
    let mut total = 0;
    let mut node = head;
    loop {
        let size = claim(model, node);
        if size == 0 {
            break;
        }
        total += size;
        match chain_next(model, &nodes.of(model, node), node) {
            Some(next) => node = next,
            None => break,
        }
    }
    total
}

/// Offer each entry of a chain, then its pair
pub(crate) fn walk_chain(
    model: &dyn HeapModel,
    nodes: &NodeLayouts,
    head: ObjectId,
    guard: &mut ChainGuard,
    v: &mut dyn MapVisitor,
) -> ControlFlow<()> {
    let mut node = head;
    loop {
        if !guard.first_visit(node) || !enter(v, node)? {
            break;
        }
        let fields = nodes.of(model, node);
        let (key, value) = entry_pair(model, &fields, node);
        emit_entry(v, key, value)?;
        match chain_next(model, &fields, node) {
            Some(next) => node = next,
            None => break,
        }
    }
    ControlFlow::Continue(())
}

fn children(model: &dyn HeapModel, fields: &NodeFields, node: ObjectId) -> [Option<ObjectId>; 2] {
    let read = |index: Option<usize>| index.and_then(|i| model.field(node, i).as_object());
    [read(fields.right), read(fields.left)]
}

/// Separate entry a tree node holds its pair through, if any
fn entry_holder(model: &dyn HeapModel, fields: &NodeFields, node: ObjectId) -> Option<ObjectId> {
    let holder = model.field(node, fields.entry?).as_object()?;
    (holder != node).then_some(holder)
}

/// Bytes of a binary tree of nodes, and the entries they hold, not yet
/// accounted for
pub(crate) fn claim_tree(model: &dyn HeapModel, nodes: &NodeLayouts, root: ObjectId) -> u64 {
    let mut total = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let size = claim(model, node);
        if size == 0 {
            continue;
        }
        total += size;
        let fields = nodes.of(model, node);
        if let Some(holder) = entry_holder(model, &fields, node) {
            total += claim(model, holder);
        }
        stack.extend(children(model, &fields, node).into_iter().flatten());
    }
    total
}

/// Pre-order walk of a tree bin; a node may hold its pair through `entry`
fn walk_tree(
    model: &dyn HeapModel,
    nodes: &NodeLayouts,
    root: ObjectId,
    guard: &mut ChainGuard,
    v: &mut dyn MapVisitor,
) -> ControlFlow<()> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !guard.first_visit(node) || !enter(v, node)? {
            continue;
        }
        let fields = nodes.of(model, node);
        let holder = match entry_holder(model, &fields, node) {
            Some(holder) => (guard.first_visit(holder) && enter(v, holder)?).then_some(holder),
            None => Some(node),
        };
        if let Some(holder) = holder {
            let (key, value) = entry_pair(model, &nodes.of(model, holder), holder);
            emit_entry(v, key, value)?;
        }
        stack.extend(children(model, &fields, node).into_iter().flatten());
    }
    ControlFlow::Continue(())
}

/// Hash map, hash table and weak hash map
#[derive(Debug, Clone)]
pub(crate) struct HashMapShape {
    pub(crate) size: usize,
    pub(crate) table: usize,
    /// Buckets may hold a tree bin (an object with a `root` field)
    pub(crate) tree_bins: bool,
    pub(crate) nodes: Arc<NodeLayouts>,
}

impl HashMapShape {
    fn tree_root(&self, model: &dyn HeapModel, bin: ObjectId) -> Option<Option<ObjectId>> {
        if !self.tree_bins {
            return None;
        }
        let index = self.nodes.of(model, bin).root?;
        Some(model.field(bin, index).as_object())
    }
}

impl CollectionShape for HashMapShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        count_value(d.field(self.size))
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        let model = d.model();
        let mut size = claim(model, d.object());
        let Some((table, buckets)) = object_array(model, d.field(self.table)) else {
            return size;
        };
        size += claim(model, table);
        if d.num_elements() == 0 {
            return size;
        }
        for bin in buckets.iter().filter_map(|b| b.as_object()) {
            size += match self.tree_root(model, bin) {
                Some(root) => claim(model, bin) + root.map_or(0, |r| claim_tree(model, &self.nodes, r)),
                None => claim_chain(model, &self.nodes, bin),
            };
        }
        size
    }

    fn sparseness_overhead(&self, d: &InstanceDescriptor<'_>, pointer_size: u32) -> Option<u64> {
        let (_, buckets) = object_array(d.model(), d.field(self.table))?;
        sparse_slots(buckets.len(), non_null(buckets), pointer_size)
    }

    fn capacity(&self, d: &InstanceDescriptor<'_>) -> Option<usize> {
        object_array(d.model(), d.field(self.table)).map(|(_, buckets)| buckets.len())
    }

    fn iterate_map(&self, d: &InstanceDescriptor<'_>, v: &mut dyn MapVisitor) -> ControlFlow<()> {
        let model = d.model();
        let Some((table, buckets)) = object_array(model, d.field(self.table)) else {
            return ControlFlow::Continue(());
        };
        if !enter(v, table)? || d.num_elements() == 0 {
            return ControlFlow::Continue(());
        }
        let mut guard = ChainGuard::new();
        for bin in buckets.iter().filter_map(|b| b.as_object()) {
            match self.tree_root(model, bin) {
                Some(root) => {
                    if !guard.first_visit(bin) || !enter(v, bin)? {
                        continue;
                    }
                    if let Some(root) = root {
                        walk_tree(model, &self.nodes, root, &mut guard, v)?;
                    }
                }
                None => walk_chain(model, &self.nodes, bin, &mut guard, v)?,
            }
        }
        ControlFlow::Continue(())
    }
}
