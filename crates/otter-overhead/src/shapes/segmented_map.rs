//! Concurrent hash map split into independently locked segments

use std::ops::ControlFlow;
use std::sync::Arc;

use otter_heap::{HeapModel, HeapValue, ObjectId};

use super::hash_map::{claim_chain, walk_chain};
use super::{CollectionShape, claim, count_value, object_array};
use crate::descriptor::InstanceDescriptor;
use crate::layout::NodeLayouts;
use crate::visit::{ChainGuard, MapVisitor, enter};

/// Field indices of the segment class
#[derive(Debug, Clone, Copy)]
pub(crate) struct SegmentFields {
    pub(crate) count: usize,
    pub(crate) table: usize,
    /// Lock state object inherited from the lock superclass
    pub(crate) sync: Option<usize>,
    pub(crate) mod_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct SegmentedMapShape {
    pub(crate) segments: usize,
    pub(crate) segment: SegmentFields,
    pub(crate) nodes: Arc<NodeLayouts>,
}

impl SegmentedMapShape {
    /// The segment array and its present segments; segments are created
    /// lazily, so slots may be null
    fn segments(&self, d: &InstanceDescriptor<'_>) -> Option<(ObjectId, Vec<ObjectId>)> {
        let (array, slots) = object_array(d.model(), d.field(self.segments))?;
        Some((array, slots.iter().filter_map(|s| s.as_object()).collect()))
    }

    fn table<'h>(&self, model: &'h dyn HeapModel, segment: ObjectId) -> Option<(ObjectId, &'h [HeapValue])> {
        object_array(model, model.field(segment, self.segment.table))
    }

    fn lock(&self, model: &dyn HeapModel, segment: ObjectId) -> Option<ObjectId> {
        model.field(segment, self.segment.sync?).as_object()
    }

    fn segment_count(&self, model: &dyn HeapModel, segment: ObjectId) -> usize {
        count_value(model.field(segment, self.segment.count))
    }
}

impl CollectionShape for SegmentedMapShape {
    fn num_elements(&self, d: &InstanceDescriptor<'_>) -> usize {
        let model = d.model();
        self.segments(d).map_or(0, |(_, segments)| {
            segments.iter().map(|s| self.segment_count(model, *s)).sum()
        })
    }

    fn impl_size(&self, d: &InstanceDescriptor<'_>) -> u64 {
        let model = d.model();
        let mut size = claim(model, d.object());
        let Some((array, segments)) = self.segments(d) else {
            return size;
        };
        size += claim(model, array);
        for segment in segments {
            size += claim(model, segment);
            if let Some(lock) = self.lock(model, segment) {
                size += claim(model, lock);
            }
            let Some((table, buckets)) = self.table(model, segment) else {
                continue;
            };
            size += claim(model, table);
            for head in buckets.iter().filter_map(|b| b.as_object()) {
                size += claim_chain(model, &self.nodes, head);
            }
        }
        size
    }

    fn sparseness_overhead(&self, d: &InstanceDescriptor<'_>, pointer_size: u32) -> Option<u64> {
        let model = d.model();
        let (_, segments) = self.segments(d)?;
        let mut elements = 0;
        let mut capacity = 0;
        let mut empty_segments = 0;
        for segment in segments {
            let Some((table, buckets)) = self.table(model, segment) else {
                continue;
            };
            let count = self.segment_count(model, segment);
            elements += count;
            capacity += buckets.len();
            if count == 0 {
                empty_segments += model.shallow_size(segment) + model.shallow_size(table);
            }
        }
        if elements >= capacity / 2 {
            return None;
        }
        Some((capacity - elements) as u64 * u64::from(pointer_size) + empty_segments)
    }

    fn capacity(&self, d: &InstanceDescriptor<'_>) -> Option<usize> {
        let model = d.model();
        let (_, segments) = self.segments(d)?;
        Some(
            segments
                .iter()
                .filter_map(|s| self.table(model, *s))
                .map(|(_, buckets)| buckets.len())
                .sum(),
        )
    }

    fn iterate_map(&self, d: &InstanceDescriptor<'_>, v: &mut dyn MapVisitor) -> ControlFlow<()> {
        let model = d.model();
        let Some((array, segments)) = self.segments(d) else {
            return ControlFlow::Continue(());
        };
        if !enter(v, array)? {
            return ControlFlow::Continue(());
        }
        let mut guard = ChainGuard::new();
        for segment in segments {
            if !enter(v, segment)? {
                continue;
            }
            if let Some(lock) = self.lock(model, segment) {
                enter(v, lock)?;
            }
            let Some((table, buckets)) = self.table(model, segment) else {
                continue;
            };
            if !enter(v, table)? || self.segment_count(model, segment) == 0 {
                continue;
            }
            for head in buckets.iter().filter_map(|b| b.as_object()) {
                walk_chain(model, &self.nodes, head, &mut guard, v)?;
            }
        }
        ControlFlow::Continue(())
    }

    fn mod_count(&self, d: &InstanceDescriptor<'_>) -> Option<i64> {
        let index = self.segment.mod_count?;
        let model = d.model();
        let segments = self.segments(d).map(|(_, s)| s).unwrap_or_default();
        Some(
            segments
                .iter()
                .map(|s| model.field(*s, index).as_long().unwrap_or(0))
                .sum(),
        )
    }
}
