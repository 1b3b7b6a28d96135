//! Concurrent hash map with a single node table and a resize table

use std::ops::ControlFlow;
use std::sync::Arc;

use otter_heap::{HeapModel, HeapValue, ObjectId};

use super::hash_map::{chain_next, claim_chain, entry_pair};
use super::{CollectionShape, claim, object_array};
use crate::descriptor::InstanceDescriptor;
use crate::layout::NodeLayouts;
use crate::visit::{ChainGuard, MapVisitor, emit_entry, enter};

#[derive(Debug, Clone)]
pub(crate) struct ConcurrentMapShape {
    pub(crate) table: usize,
    pub(crate) next_table: Option<usize>,
    pub(crate) nodes: Arc<NodeLayouts>,
}

/// What a table slot holds
enum Bin {
    /// Plain node chain
    Chain(ObjectId),
    /// Tree bin wrapper and the first node of its chain
    Tree(ObjectId, Option<ObjectId>),
    /// Moved to the resize table
    Forwarded(ObjectId),
}

impl ConcurrentMapShape {
    fn tables<'h>(&self, d: &InstanceDescriptor<'h>) -> Vec<(ObjectId, &'h [HeapValue])> {
        let model = d.model();
        std::iter::once(self.table)
            .chain(self.next_table)
            .filter_map(|index| object_array(model, d.field(index)))
            .collect()
    }

    fn classify(&self, model: &dyn HeapModel, bin: ObjectId) -> Bin {
        let fields = self.nodes.of(model, bin);
        if fields.next_table.is_some() {
            return Bin::Forwarded(bin);
        }
        match (fields.root, fields.first) {
            (Some(_), Some(first)) => Bin::Tree(bin, model.field(bin, first).as_object()),
            _ => Bin::Chain(bin),
        }
    }

    /// Nodes of a chain that carry a key
    fn for_each_entry(
        &self,
        model: &dyn HeapModel,
        head: ObjectId,
        guard: &mut ChainGuard,
        mut f: impl FnMut(ObjectId, Option<ObjectId>, Option<ObjectId>) -> ControlFlow<(), bool>,
    ) -> ControlFlow<()> {
        let mut node = head;
        loop {
            if !guard.first_visit(node) {
                break;
            }
            let fields = self.nodes.of(model, node);
            let (key, value) = entry_pair(model, &fields, node);
            if !f(node, key, value)? {
                break;
            }
            match chain_next(model, &fields, node) {
                Some(next) => node = next,
                None => break,
            }
        }
        ControlFlow::Continue(())
    }
}

impl CollectionShape for ConcurrentMapShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        let model = d.model();
        let mut guard = ChainGuard::new();
        let mut count = 0;
        for (_, bins) in self.tables(d) {
            for bin in bins.iter().filter_map(|b| b.as_object()) {
                let head = match self.classify(model, bin) {
                    Bin::Chain(head) => head,
                    Bin::Tree(_, Some(first)) => first,
                    Bin::Tree(_, None) | Bin::Forwarded(_) => continue,
                };
                let _ = self.for_each_entry(model, head, &mut guard, |_, key, _| {
                    if key.is_some() {
                        count += 1;
                    }
                    ControlFlow::Continue(true)
                });
            }
        }
        count
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        let model = d.model();
        let mut size = claim(model, d.object());
        for (table, bins) in self.tables(d) {
            size += claim(model, table);
            for bin in bins.iter().filter_map(|b| b.as_object()) {
                size += match self.classify(model, bin) {
                    Bin::Chain(head) => claim_chain(model, &self.nodes, head),
                    Bin::Tree(bin, first) => {
                        claim(model, bin) + first.map_or(0, |f| claim_chain(model, &self.nodes, f))
                    }
                    Bin::Forwarded(bin) => claim(model, bin),
                };
            }
        }
        size
    }

    fn sparseness_overhead(&self, d: &InstanceDescriptor<'_>, pointer_size: u32) -> Option<u64> {
        let model = d.model();
        let mut live = 0;
        let mut capacity = 0;
        let mut empty_tables = 0;
        for (table, bins) in self.tables(d) {
            // Forwarded slots were moved to the resize table
            let occupied = bins
                .iter()
                .filter_map(|b| b.as_object())
                .filter(|b| !matches!(self.classify(model, *b), Bin::Forwarded(_)))
                .count();
            live += occupied;
            capacity += bins.len();
            if occupied == 0 {
                empty_tables += model.shallow_size(table);
            }
        }
        if live >= capacity / 2 {
            return None;
        }
        Some((capacity - live) as u64 * u64::from(pointer_size) + empty_tables)
    }

    fn capacity(&self, d: &InstanceDescriptor<'_>) -> Option<usize> {
        Some(self.tables(d).iter().map(|(_, bins)| bins.len()).sum())
    }

    fn iterate_map(&self, d: &InstanceDescriptor<'_>, v: &mut dyn MapVisitor) -> ControlFlow<()> {
        let model = d.model();
        let mut guard = ChainGuard::new();
        for (table, bins) in self.tables(d) {
            if !enter(v, table)? {
                continue;
            }
            for bin in bins.iter().filter_map(|b| b.as_object()) {
                let head = match self.classify(model, bin) {
                    Bin::Chain(head) => head,
                    Bin::Tree(bin, first) => {
                        if !enter(v, bin)? {
                            continue;
                        }
                        match first {
                            Some(first) => first,
                            None => continue,
                        }
                    }
                    Bin::Forwarded(_) => continue,
                };
                self.for_each_entry(model, head, &mut guard, |node, key, value| {
                    if !enter(v, node)? {
                        return ControlFlow::Continue(false);
                    }
                    if key.is_some() {
                        emit_entry(v, key, value)?;
                    }
                    ControlFlow::Continue(true)
                })?;
            }
        }
        ControlFlow::Continue(())
    }

    fn mod_count(&self, _d: &InstanceDescriptor<'_>) -> Option<i64> {
        None
    }
}
