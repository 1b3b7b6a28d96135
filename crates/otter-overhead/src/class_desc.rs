//! Per-class collection facts and overhead counters

use std::sync::atomic::{AtomicU64, Ordering};

use otter_heap::ClassId;
use serde::Serialize;

use crate::problem::ProblemKind;

/// Static facts about a collection class
#[derive(Debug, Clone, Default)]
pub struct ClassFacts {
    /// Elements are key/value pairs
    pub is_map: bool,
    /// A `modCount`-like counter can be read from instances
    pub can_determine_mod_count: bool,
    /// Classes whose instances belong to this collection's implementation
    pub impl_class_names: Vec<String>,
    /// Collections that may wrap this one as part of their implementation
    pub parent_class_names: Vec<String>,
    /// The implementation contains another collection
    pub has_other_collection_in_impl: bool,
}

/// A collection class with overhead counters per problem kind.
///
/// Counters only grow during an analysis pass; any thread may add.
#[derive(Debug)]
pub struct ClassDescriptor {
    class: ClassId,
    name: String,
    facts: ClassFacts,
    counts: [AtomicU64; ProblemKind::COUNT],
    overheads: [AtomicU64; ProblemKind::COUNT],
}

impl ClassDescriptor {
    /// Create a descriptor with zeroed counters
    pub fn new(class: ClassId, name: impl Into<String>, facts: ClassFacts) -> Self {
        Self {
            class,
            name: name.into(),
            facts,
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
            overheads: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Same facts, new class, fresh counters
    pub fn clone_for_subclass(&self, class: ClassId, name: impl Into<String>) -> Self {
        Self::new(class, name, self.facts.clone())
    }

    /// Described class
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Described class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Static facts
    pub fn facts(&self) -> &ClassFacts {
        &self.facts
    }

    /// Whether elements are key/value pairs
    pub fn is_map(&self) -> bool {
        self.facts.is_map
    }

    /// Whether instances expose a modification counter
    pub fn can_determine_mod_count(&self) -> bool {
        self.facts.can_determine_mod_count
    }

    /// Whether the implementation contains another collection
    pub fn has_other_collection_in_impl(&self) -> bool {
        self.facts.has_other_collection_in_impl
    }

    /// Record one problematic instance
    pub fn add_problematic_collection(&self, kind: ProblemKind, overhead: u64) {
        self.counts[kind.index()].fetch_add(1, Ordering::Relaxed);
        self.overheads[kind.index()].fetch_add(overhead, Ordering::Relaxed);
    }

    /// Instances recorded under `kind`
    pub fn num_problematic(&self, kind: ProblemKind) -> u64 {
        self.counts[kind.index()].load(Ordering::Relaxed)
    }

    /// Bytes recorded under `kind`
    pub fn problematic_overhead(&self, kind: ProblemKind) -> u64 {
        self.overheads[kind.index()].load(Ordering::Relaxed)
    }

    /// Bytes recorded under every kind
    pub fn total_overhead(&self) -> u64 {
        self.overheads
            .iter()
            .map(|o| o.load(Ordering::Relaxed))
            .sum()
    }

    /// Whether `class_name` is one of the implementation classes
    pub fn is_impl_class_name(&self, class_name: &str) -> bool {
        self.facts.impl_class_names.iter().any(|n| n == class_name)
    }

    /// Whether instances may be part of the implementation of `parent_class_name`
    pub fn is_in_implementation_of(&self, parent_class_name: &str) -> bool {
        self.facts.parent_class_names.iter().any(|n| n == parent_class_name)
    }

    /// Snapshot of the counters
    pub fn summary(&self) -> ClassOverhead {
        let problems = ProblemKind::ALL
            .iter()
            .filter(|kind| self.num_problematic(**kind) > 0)
            .map(|kind| ProblemCount {
                kind: *kind,
                count: self.num_problematic(*kind),
                overhead: self.problematic_overhead(*kind),
            })
            .collect();
        ClassOverhead {
            class_name: self.name.clone(),
            total_overhead: self.total_overhead(),
            problems,
        }
    }
}

/// Counter values for one problem kind
#[derive(Debug, Clone, Serialize)]
pub struct ProblemCount {
    /// Problem kind
    pub kind: ProblemKind,
    /// Instances
    pub count: u64,
    /// Bytes
    pub overhead: u64,
}

/// Counter values for one class
#[derive(Debug, Clone, Serialize)]
pub struct ClassOverhead {
    /// Class name
    pub class_name: String,
    /// Bytes over all kinds
    pub total_overhead: u64,
    /// Non-empty kinds
    pub problems: Vec<ProblemCount>,
}

/// Overhead per class, highest first
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverheadTable {
    /// Classes with non-zero overhead
    pub classes: Vec<ClassOverhead>,
}

impl OverheadTable {
    /// Bytes over all classes
    pub fn total_overhead(&self) -> u64 {
        self.classes.iter().map(|c| c.total_overhead).sum()
    }

    /// Export as JSON
    pub fn to_json(&self) -> serde_json::Value {
        let classes: Vec<_> = self
            .classes
            .iter()
            .map(|c| {
                serde_json::json!({
                    "class": c.class_name,
                    "overhead": c.total_overhead,
                    "problems": c.problems,
                })
            })
            .collect();
        serde_json::json!({
            "totalOverhead": self.total_overhead(),
            "classes": classes,
        })
    }
}
