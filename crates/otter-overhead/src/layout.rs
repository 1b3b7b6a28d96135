//! Field layouts resolved against the classes of a snapshot

use std::sync::Arc;

use otter_heap::{ClassId, FieldType, HeapClass, HeapModel, ObjectId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{DescriptorError, OverheadResult};

/// Index of the first candidate name present in `class`.
///
/// Each candidate is looked up from the most derived class down, so a
/// subclass field shadows an inherited one of the same name.
pub(crate) fn resolve_field(class: &HeapClass, candidates: &[&str]) -> OverheadResult<usize> {
    resolve_optional(class, candidates)
        .ok_or_else(|| DescriptorError::missing_field(class.name(), candidates))
}

/// Like [`resolve_field`], but the field must hold an `int` or `long`
pub(crate) fn resolve_int_field(class: &HeapClass, candidates: &[&str]) -> OverheadResult<usize> {
    let index = resolve_field(class, candidates)?;
    match class.field(index) {
        Some(f) if matches!(f.ty, FieldType::Int | FieldType::Long) => Ok(index),
        Some(f) => Err(DescriptorError::FieldType {
            class: class.name().to_string(),
            field: f.name.clone(),
        }),
        None => Err(DescriptorError::missing_field(class.name(), candidates)),
    }
}

pub(crate) fn resolve_optional(class: &HeapClass, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|name| class.field_index(name))
}

/// Index of `modCount` if it is an `int` or `long`
pub(crate) fn resolve_mod_count(class: &HeapClass) -> Option<usize> {
    let index = class.field_index("modCount")?;
    let ty = class.field(index)?.ty;
    matches!(ty, FieldType::Int | FieldType::Long).then_some(index)
}

/// Fields of a collection class not covered by its descriptor
#[derive(Debug, Clone)]
pub(crate) enum ExtraFields {
    /// Every field is known, banned or primitive
    None,
    /// Indices of the known, banned and primitive fields; the rest are extra
    Filter(Arc<[usize]>),
}

impl ExtraFields {
    /// Classify the fields of `class`
    pub(crate) fn compute(class: &HeapClass, known: &[usize], banned: &[usize]) -> Self {
        let fields = class.instance_fields();
        let covered: Vec<usize> = (0..fields.len())
            .filter(|i| known.contains(i) || banned.contains(i) || !fields[*i].ty.is_reference())
            .collect();
        if covered.len() == fields.len() {
            ExtraFields::None
        } else {
            ExtraFields::Filter(covered.into())
        }
    }
}

/// Accepted names for the payload fields of entry and node classes
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeNames {
    pub(crate) key: &'static [&'static str],
    pub(crate) value: &'static [&'static str],
    pub(crate) element: &'static [&'static str],
}

impl NodeNames {
    pub(crate) const MAP: NodeNames = NodeNames {
        key: &["key"],
        value: &["value", "val"],
        element: &[],
    };

    pub(crate) const WEAK_MAP: NodeNames = NodeNames {
        key: &["referent"],
        value: &["value"],
        element: &[],
    };

    pub(crate) const LIST: NodeNames = NodeNames {
        key: &[],
        value: &[],
        element: &["element", "item", "data"],
    };
}

/// Field indices of one entry or node class; absent fields are `None`
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NodeFields {
    pub(crate) key: Option<usize>,
    pub(crate) value: Option<usize>,
    pub(crate) element: Option<usize>,
    pub(crate) next: Option<usize>,
    pub(crate) left: Option<usize>,
    pub(crate) right: Option<usize>,
    /// Tree bin marker
    pub(crate) root: Option<usize>,
    /// First node of a tree bin
    pub(crate) first: Option<usize>,
    /// Indirection from a tree node to its entry
    pub(crate) entry: Option<usize>,
    /// Parallel key array of a legacy tree node
    pub(crate) keys: Option<usize>,
    /// Parallel value array of a legacy tree node
    pub(crate) values: Option<usize>,
    /// Forwarding node marker
    pub(crate) next_table: Option<usize>,
}

impl NodeFields {
    fn resolve(class: &HeapClass, names: &NodeNames) -> Self {
        Self {
            key: resolve_optional(class, names.key),
            value: resolve_optional(class, names.value),
            element: resolve_optional(class, names.element),
            next: class.field_index("next"),
            left: class.field_index("left"),
            right: class.field_index("right"),
            root: class.field_index("root"),
            first: class.field_index("first"),
            entry: class.field_index("entry"),
            keys: class.field_index("keys"),
            values: class.field_index("values"),
            next_table: class.field_index("nextTable"),
        }
    }

    /// Node of a legacy tree map holding parallel key and value arrays
    pub(crate) fn is_parallel_arrays(&self) -> bool {
        self.key.is_none() && self.keys.is_some()
    }
}

/// Node layouts resolved lazily per runtime class.
///
/// Nodes of one collection can belong to several classes (plain and tree
/// nodes, forwarding nodes during a resize), so indices are cached per class
/// rather than per collection.
#[derive(Debug)]
pub(crate) struct NodeLayouts {
    names: NodeNames,
    cache: RwLock<FxHashMap<ClassId, NodeFields>>,
}

impl NodeLayouts {
    pub(crate) fn new(names: NodeNames) -> Arc<Self> {
        Arc::new(Self {
            names,
            cache: RwLock::new(FxHashMap::default()),
        })
    }

    pub(crate) fn of_class(&self, model: &dyn HeapModel, class: ClassId) -> NodeFields {
        if let Some(fields) = self.cache.read().get(&class) {
            return *fields;
        }
        let fields = NodeFields::resolve(model.class(class), &self.names);
        self.cache.write().insert(class, fields);
        fields
    }

    pub(crate) fn of(&self, model: &dyn HeapModel, obj: ObjectId) -> NodeFields {
        self.of_class(model, model.class_of(obj))
    }
}
