//! Class-indexed registry of collection descriptor factories

use std::sync::Arc;

use otter_heap::{ClassId, HeapModel, ObjectId};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::class_desc::{ClassDescriptor, ClassFacts, OverheadTable};
use crate::config::{LayoutDetection, OverheadConfig};
use crate::descriptor::InstanceDescriptor;
use crate::error::{DescriptorError, OverheadResult};
use crate::factory::{DescriptorFactory, FactorySpec};
use crate::layout::{
    NodeLayouts, NodeNames, resolve_field, resolve_int_field, resolve_mod_count, resolve_optional,
};
use crate::names::{self, array_of};
use crate::shapes::{
    ArrayListShape, ConcurrentMapShape, DelegateShape, DequeShape, FullArrayShape, HashMapShape,
    IdentityMapShape, LinkedShape, SegmentFields, SegmentedMapShape, Shape, TreeMapShape,
};
use crate::standalone::StandaloneArray;

/// Collection classes known in one snapshot.
///
/// Built once, then read-only apart from standalone-array descriptors,
/// which are created on first request.
pub struct Registry<'h> {
    model: &'h dyn HeapModel,
    factories: FxHashMap<ClassId, Arc<DescriptorFactory>>,
    banned: FxHashMap<ClassId, Vec<usize>>,
    tree_capable_hash_maps: bool,
    arrays: RwLock<FxHashMap<ClassId, Arc<ClassDescriptor>>>,
}

impl<'h> Registry<'h> {
    /// Build with the default configuration
    pub fn new(model: &'h dyn HeapModel) -> Self {
        Self::build(model, OverheadConfig::default())
    }

    /// Describe every known collection class present in `model`, then
    /// extend coverage to their subclasses
    pub fn build(model: &'h dyn HeapModel, config: OverheadConfig) -> Self {
        let mut builder = Builder::new(model, &config);
        builder.register_known_classes();
        let known = builder.factories.len();
        if config.cover_subclasses {
            builder.register_subclasses();
        }
        tracing::info!(
            target: "otter::overhead",
            collections = known,
            subclasses = builder.factories.len() - known,
            tree_capable_hash_maps = builder.tree_capable,
            "collection registry built"
        );
        Self {
            model,
            factories: builder.factories,
            banned: builder.banned,
            tree_capable_hash_maps: builder.tree_capable,
            arrays: RwLock::new(FxHashMap::default()),
        }
    }

    /// The snapshot this registry describes
    pub fn model(&self) -> &'h dyn HeapModel {
        self.model
    }

    /// Number of described collection classes, subclasses included
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no collection class was found
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Whether hash map buckets may hold tree bins in this snapshot
    pub fn uses_tree_capable_hash_maps(&self) -> bool {
        self.tree_capable_hash_maps
    }

    /// Factory for a class
    pub fn factory_for(&self, class: ClassId) -> Option<&Arc<DescriptorFactory>> {
        self.factories.get(&class)
    }

    /// Descriptor for `obj` if its class is a known collection
    pub fn classify(&self, obj: ObjectId) -> Option<InstanceDescriptor<'h>> {
        let factory = self.factories.get(&self.model.class_of(obj))?;
        Some(factory.descriptor(self.model, obj))
    }

    /// Class descriptor of a collection or standalone-array class
    pub fn class_descriptor_for(&self, class_name: &str) -> Option<Arc<ClassDescriptor>> {
        let class = self.model.class_by_name(class_name)?;
        if let Some(factory) = self.factories.get(&class) {
            return Some(Arc::clone(factory.class_descriptor()));
        }
        self.arrays.read().get(&class).cloned()
    }

    /// Class descriptor of the class of `obj`
    pub fn class_descriptor_of(&self, obj: ObjectId) -> Option<Arc<ClassDescriptor>> {
        self.class_descriptor_for(self.model.class_name_of(obj))
    }

    /// Class descriptor for an array treated as a degenerate collection,
    /// created on first request
    pub fn standalone_array_descriptor(&self, array: ObjectId) -> OverheadResult<Arc<ClassDescriptor>> {
        let class = self.model.class_of(array);
        let heap_class = self.model.class(class);
        if !heap_class.is_array() {
            return Err(DescriptorError::NotAnArray(heap_class.name().to_string()));
        }
        if let Some(desc) = self.arrays.read().get(&class) {
            return Ok(Arc::clone(desc));
        }
        let mut arrays = self.arrays.write();
        let desc = arrays
            .entry(class)
            .or_insert_with(|| Arc::new(ClassDescriptor::new(class, heap_class.name(), ClassFacts::default())));
        Ok(Arc::clone(desc))
    }

    /// View of an array as a degenerate collection
    pub fn standalone_array(&self, array: ObjectId) -> OverheadResult<StandaloneArray<'h>> {
        let class = self.standalone_array_descriptor(array)?;
        Ok(StandaloneArray::new(self.model, array, class))
    }

    /// Implementation-inclusive size of a collection; `None` for other objects
    pub fn impl_inclusive_size(&self, obj: ObjectId) -> Option<u64> {
        self.classify(obj).map(|d| d.impl_size())
    }

    /// Whether a field is reachable by a shorter path and should not be
    /// followed by a reachability scan
    pub fn is_field_banned(&self, class: ClassId, index: usize) -> bool {
        banned_in_chain(self.model, &self.banned, class).contains(&index)
    }

    /// Class descriptors with non-zero overhead, highest first
    pub fn overheads_by_class(&self) -> Vec<Arc<ClassDescriptor>> {
        let mut result: Vec<Arc<ClassDescriptor>> = self
            .factories
            .values()
            .map(|f| Arc::clone(f.class_descriptor()))
            .chain(self.arrays.read().values().cloned())
            .filter(|d| d.total_overhead() > 0)
            .collect();
        result.sort_by(|a, b| {
            b.total_overhead()
                .cmp(&a.total_overhead())
                .then_with(|| a.name().cmp(b.name()))
        });
        result
    }

    /// Serializable snapshot of [`Registry::overheads_by_class`]
    pub fn overhead_table(&self) -> OverheadTable {
        OverheadTable {
            classes: self.overheads_by_class().iter().map(|d| d.summary()).collect(),
        }
    }
}

/// Banned indices declared on `class` and its superclasses
fn banned_in_chain(model: &dyn HeapModel, banned: &FxHashMap<ClassId, Vec<usize>>, class: ClassId) -> Vec<usize> {
    let mut result = Vec::new();
    let mut current = Some(class);
    while let Some(id) = current {
        if let Some(indices) = banned.get(&id) {
            result.extend_from_slice(indices);
        }
        current = model.class(id).superclass();
    }
    result
}

struct Builder<'a> {
    model: &'a dyn HeapModel,
    factories: FxHashMap<ClassId, Arc<DescriptorFactory>>,
    banned: FxHashMap<ClassId, Vec<usize>>,
    tree_capable: bool,
    modern_concurrent_map: bool,
}

/// Fields whose content is reachable by a shorter path. `first` picks the
/// least derived field of that name.
const BANNED_FIELDS: &[(&str, &str, bool)] = &[
    (names::LINKED_HASH_MAP, "header", false),
    (names::LINKED_HASH_MAP, "head", false),
    (names::LINKED_HASH_MAP, "tail", false),
    (names::LINKED_HASH_MAP_ENTRY, "before", false),
    (names::LINKED_HASH_MAP_ENTRY, "after", false),
    (names::LINKED_LIST, "last", false),
    (names::CONCURRENT_LINKED_QUEUE, "tail", false),
    // The reference queue link inherited by weak entries, not the entry's own chain
    (names::WEAK_HASH_MAP_ENTRY, "next", true),
];

impl<'a> Builder<'a> {
    fn new(model: &'a dyn HeapModel, config: &OverheadConfig) -> Self {
        let tree_capable = match config.hash_map_layout {
            LayoutDetection::Legacy => false,
            LayoutDetection::Modern => true,
            LayoutDetection::Auto => model
                .class_by_name(names::HASH_MAP)
                .is_some_and(|c| !model.class(c).has_static_field(names::LEGACY_HASH_MAP_MARKER)),
        };
        let modern_concurrent_map = match config.concurrent_map_layout {
            LayoutDetection::Legacy => false,
            LayoutDetection::Modern => true,
            LayoutDetection::Auto => {
                tree_capable && model.class_by_name(names::CONCURRENT_HASH_MAP_NODE).is_some()
            }
        };
        let mut builder = Self {
            model,
            factories: FxHashMap::default(),
            banned: FxHashMap::default(),
            tree_capable,
            modern_concurrent_map,
        };
        if config.ban_redundant_fields {
            builder.ban_fields();
        }
        builder
    }

    fn ban_fields(&mut self) {
        for (class_name, field, first) in BANNED_FIELDS {
            let Some(class) = self.model.class_by_name(class_name) else {
                continue;
            };
            let heap_class = self.model.class(class);
            let index = if *first {
                heap_class.first_field_index(field)
            } else {
                heap_class.field_index(field)
            };
            if let Some(index) = index {
                self.banned.entry(class).or_default().push(index);
            }
        }
    }

    fn class(&self, name: &str) -> Option<ClassId> {
        self.model.class_by_name(name)
    }

    fn factory(&self, name: &str) -> OverheadResult<Arc<DescriptorFactory>> {
        self.class(name)
            .and_then(|c| self.factories.get(&c))
            .cloned()
            .ok_or_else(|| DescriptorError::MissingClass(name.to_string()))
    }

    /// Names of implementation classes present in the snapshot, trying
    /// runtime-specific alternatives for absent ones
    fn impl_names(&self, wanted: &[String]) -> Vec<String> {
        let mut found = Vec::new();
        for name in wanted {
            if self.class(name).is_some() {
                found.push(name.clone());
                continue;
            }
            match names::alternative_names(name).into_iter().find(|alt| self.class(alt).is_some()) {
                Some(alt) => found.push(alt),
                None => tracing::debug!(
                    target: "otter::overhead",
                    class = %name,
                    "implementation class not found"
                ),
            }
        }
        found
    }

    fn with_arrays(classes: &[&str]) -> Vec<String> {
        classes
            .iter()
            .flat_map(|c| [c.to_string(), array_of(c)])
            .collect()
    }

    /// Register `class_name` if the snapshot has it
    fn register(
        &mut self,
        class_name: &str,
        make: impl FnOnce(&Self, ClassId) -> OverheadResult<FactorySpec>,
    ) {
        let Some(class) = self.class(class_name) else {
            return;
        };
        match make(&*self, class) {
            Ok(spec) => {
                let banned = banned_in_chain(self.model, &self.banned, class);
                let factory = DescriptorFactory::new(self.model, class, spec, &banned);
                tracing::debug!(
                    target: "otter::overhead",
                    class = class_name,
                    extra_fields = factory.has_extra_obj_fields(),
                    "collection class registered"
                );
                self.factories.insert(class, Arc::new(factory));
            }
            Err(err) => tracing::warn!(
                target: "otter::overhead",
                class = class_name,
                error = %err,
                "unsupported collection class"
            ),
        }
    }

    fn register_known_classes(&mut self) {
        let (entry, hash_map_impl) = if self.tree_capable {
            (
                names::HASH_MAP_NODE,
                vec![
                    names::HASH_MAP_NODE.to_string(),
                    names::HASH_MAP_TREE_NODE.to_string(),
                    array_of(names::HASH_MAP_NODE),
                ],
            )
        } else {
            (names::HASH_MAP_ENTRY, Self::with_arrays(&[names::HASH_MAP_ENTRY]))
        };

        self.register(names::HASH_MAP, |b, c| {
            let facts = b.map_facts(&hash_map_impl, &[names::HASH_SET]);
            b.hash_map(c, facts, &["size"], b.tree_capable, NodeNames::MAP, 16)
        });
        self.register(names::LINKED_HASH_MAP, |b, c| {
            let wanted = vec![names::LINKED_HASH_MAP_ENTRY.to_string(), array_of(entry)];
            let facts = b.map_facts(&wanted, &[names::LINKED_HASH_SET]);
            b.hash_map(c, facts, &["size"], b.tree_capable, NodeNames::MAP, 16)
        });
        self.register(names::HASH_SET, |b, c| {
            let mut wanted = vec![names::HASH_MAP.to_string()];
            wanted.extend(hash_map_impl.iter().cloned());
            b.delegate(c, &["map"], b.factory(names::HASH_MAP)?, &wanted)
        });
        self.register(names::LINKED_HASH_SET, |b, c| {
            let wanted = vec![
                names::LINKED_HASH_MAP.to_string(),
                names::LINKED_HASH_MAP_ENTRY.to_string(),
                array_of(entry),
            ];
            b.delegate(c, &["map"], b.factory(names::LINKED_HASH_MAP)?, &wanted)
        });

        self.register_array_list(names::ARRAY_LIST, &["size"], &["elementData", "array"], 10);
        self.register_array_list(names::VECTOR, &["elementCount"], &["elementData"], 10);
        self.register_array_list(names::STACK, &["elementCount"], &["elementData"], 10);

        for table in [names::HASHTABLE, names::PROPERTIES] {
            self.register(table, |b, c| {
                let facts = b.map_facts(&Self::with_arrays(&[names::HASHTABLE_ENTRY]), &[]);
                b.hash_map(c, facts, &["count", "size"], false, NodeNames::MAP, 11)
            });
        }

        self.register(names::CONCURRENT_HASH_MAP, |b, c| {
            if b.modern_concurrent_map {
                b.concurrent_map(c)
            } else {
                b.segmented_map(c)
            }
        });

        self.register(names::WEAK_HASH_MAP, |b, c| {
            let facts = b.map_facts(&Self::with_arrays(&[names::WEAK_HASH_MAP_ENTRY]), &[]);
            b.hash_map(c, facts, &["size"], false, NodeNames::WEAK_MAP, 16)
        });

        self.register(names::TREE_MAP, |b, c| b.tree_map(c));
        self.register(names::TREE_SET, |b, c| {
            let wanted = vec![names::TREE_MAP.to_string(), names::TREE_MAP_ENTRY.to_string()];
            b.delegate(c, &["m"], b.factory(names::TREE_MAP)?, &wanted)
        });

        let list_node = if self.class(names::LINKED_LIST_NODE).is_some() {
            names::LINKED_LIST_NODE
        } else {
            names::LINKED_LIST_ENTRY
        };
        self.register(names::LINKED_LIST, |b, c| {
            b.linked(c, Some(&["size"]), &["header", "first", "voidLink"], &[list_node])
        });

        self.register(names::IDENTITY_HASH_MAP, |b, c| {
            let heap_class = b.model.class(c);
            let table = resolve_field(heap_class, &["table"])?;
            Ok(FactorySpec {
                facts: b.map_facts(&[], &[]),
                shape: Shape::IdentityMap(IdentityMapShape {
                    size: resolve_int_field(heap_class, &["size"])?,
                    table,
                }),
                default_capacity: 32,
                known_fields: vec![table],
                mod_count_override: None,
            })
        });

        self.register_array_list(names::ARRAY_BLOCKING_QUEUE, &["count"], &["items"], 0);

        self.register(names::ARRAY_DEQUE, |b, c| {
            let heap_class = b.model.class(c);
            let elements = resolve_field(heap_class, &["elements"])?;
            Ok(FactorySpec {
                facts: b.list_facts(&[], &[]),
                shape: Shape::Deque(DequeShape {
                    elements,
                    head: resolve_int_field(heap_class, &["head"])?,
                    tail: resolve_int_field(heap_class, &["tail"])?,
                }),
                default_capacity: 16,
                known_fields: vec![elements],
                mod_count_override: None,
            })
        });

        self.register_array_list(names::ATTRIBUTE_LIST, &["size"], &["elementData"], 10);

        self.register(names::CONCURRENT_LINKED_QUEUE, |b, c| {
            b.linked(c, None, &["head"], &[names::CONCURRENT_LINKED_QUEUE_NODE])
        });

        self.register(names::COPY_ON_WRITE_ARRAY_LIST, |b, c| {
            let elements = resolve_field(b.model.class(c), &["array"])?;
            Ok(FactorySpec {
                facts: b.list_facts(&[], &[names::COPY_ON_WRITE_ARRAY_SET]),
                shape: Shape::FullArray(FullArrayShape { elements }),
                default_capacity: 0,
                known_fields: vec![elements],
                mod_count_override: None,
            })
        });
        self.register(names::COPY_ON_WRITE_ARRAY_SET, |b, c| {
            let wanted = vec![names::COPY_ON_WRITE_ARRAY_LIST.to_string()];
            b.delegate(c, &["al"], b.factory(names::COPY_ON_WRITE_ARRAY_LIST)?, &wanted)
        });

        self.register_array_list(names::PRIORITY_QUEUE, &["size"], &["queue"], 11);
    }

    /// Give every unregistered class the layout of its nearest registered
    /// ancestor
    fn register_subclasses(&mut self) {
        let mut added = Vec::new();
        for index in 0..self.model.class_count() {
            let class = ClassId::from_index(index);
            if self.factories.contains_key(&class) {
                continue;
            }
            let mut ancestor = self.model.class(class).superclass();
            while let Some(id) = ancestor {
                if let Some(factory) = self.factories.get(&id) {
                    let banned = banned_in_chain(self.model, &self.banned, class);
                    added.push((class, factory.clone_for_subclass(self.model, class, &banned)));
                    break;
                }
                ancestor = self.model.class(id).superclass();
            }
        }
        for (class, factory) in added {
            tracing::debug!(
                target: "otter::overhead",
                class = self.model.class(class).name(),
                parent = factory.class_descriptor().name(),
                "collection subclass registered"
            );
            self.factories.insert(class, Arc::new(factory));
        }
    }

    fn map_facts(&self, impl_names: &[String], parents: &[&str]) -> ClassFacts {
        ClassFacts {
            is_map: true,
            impl_class_names: self.impl_names(impl_names),
            parent_class_names: parents.iter().map(|p| p.to_string()).collect(),
            ..ClassFacts::default()
        }
    }

    fn list_facts(&self, impl_names: &[String], parents: &[&str]) -> ClassFacts {
        ClassFacts {
            is_map: false,
            ..self.map_facts(impl_names, parents)
        }
    }

    fn register_array_list(&mut self, class_name: &str, size: &[&str], elements: &[&str], default_capacity: usize) {
        self.register(class_name, |b, c| {
            let heap_class = b.model.class(c);
            let elements = resolve_field(heap_class, elements)?;
            Ok(FactorySpec {
                facts: b.list_facts(&[], &[]),
                shape: Shape::ArrayList(ArrayListShape {
                    size: resolve_int_field(heap_class, size)?,
                    elements,
                }),
                default_capacity,
                known_fields: vec![elements],
                mod_count_override: None,
            })
        });
    }

    fn hash_map(
        &self,
        class: ClassId,
        facts: ClassFacts,
        size: &[&str],
        tree_bins: bool,
        nodes: NodeNames,
        default_capacity: usize,
    ) -> OverheadResult<FactorySpec> {
        let heap_class = self.model.class(class);
        let table = resolve_field(heap_class, &["table"])?;
        Ok(FactorySpec {
            facts,
            shape: Shape::HashMap(HashMapShape {
                size: resolve_int_field(heap_class, size)?,
                table,
                tree_bins,
                nodes: NodeLayouts::new(nodes),
            }),
            default_capacity,
            known_fields: vec![table],
            mod_count_override: None,
        })
    }

    fn delegate(
        &self,
        class: ClassId,
        field: &[&str],
        inner: Arc<DescriptorFactory>,
        impl_names: &[String],
    ) -> OverheadResult<FactorySpec> {
        let field = resolve_field(self.model.class(class), field)?;
        let inner_class = inner.class_descriptor();
        Ok(FactorySpec {
            facts: ClassFacts {
                has_other_collection_in_impl: true,
                ..self.list_facts(impl_names, &[])
            },
            mod_count_override: Some(inner_class.can_determine_mod_count()),
            default_capacity: inner.default_capacity(),
            shape: Shape::Delegate(DelegateShape { field, inner }),
            known_fields: Vec::new(),
        })
    }

    fn tree_map(&self, class: ClassId) -> OverheadResult<FactorySpec> {
        let heap_class = self.model.class(class);
        let root = resolve_field(heap_class, &["root"])?;
        let entry = [names::TREE_MAP_ENTRY, names::TREE_MAP_NODE]
            .into_iter()
            .find(|name| self.class(name).is_some());
        let impl_names: Vec<String> = entry.into_iter().map(str::to_string).collect();
        Ok(FactorySpec {
            facts: self.map_facts(&impl_names, &[names::TREE_SET]),
            shape: Shape::TreeMap(TreeMapShape {
                size: resolve_int_field(heap_class, &["size"])?,
                root,
                nodes: NodeLayouts::new(NodeNames::MAP),
            }),
            default_capacity: 0,
            known_fields: vec![root],
            mod_count_override: None,
        })
    }

    fn linked(
        &self,
        class: ClassId,
        size: Option<&[&str]>,
        root: &[&str],
        node_classes: &[&str],
    ) -> OverheadResult<FactorySpec> {
        let heap_class = self.model.class(class);
        let root_index = resolve_field(heap_class, root)?;
        let root_name = heap_class
            .field(root_index)
            .map(|f| f.name.as_str())
            .unwrap_or_default();
        let size = size.map(|candidates| resolve_int_field(heap_class, candidates)).transpose()?;
        let impl_names: Vec<String> = node_classes.iter().map(|n| n.to_string()).collect();
        Ok(FactorySpec {
            facts: self.list_facts(&impl_names, &[]),
            shape: Shape::Linked(LinkedShape {
                size,
                root: root_index,
                sentinel: matches!(root_name, "header" | "voidLink"),
                nodes: NodeLayouts::new(NodeNames::LIST),
            }),
            default_capacity: 0,
            known_fields: vec![root_index],
            mod_count_override: None,
        })
    }

    fn concurrent_map(&self, class: ClassId) -> OverheadResult<FactorySpec> {
        let heap_class = self.model.class(class);
        let table = resolve_field(heap_class, &["table"])?;
        let next_table = resolve_optional(heap_class, &["nextTable"]);
        Ok(FactorySpec {
            facts: self.map_facts(&Self::with_arrays(&[names::CONCURRENT_HASH_MAP_NODE]), &[]),
            shape: Shape::ConcurrentMap(ConcurrentMapShape {
                table,
                next_table,
                nodes: NodeLayouts::new(NodeNames::MAP),
            }),
            default_capacity: 16,
            known_fields: std::iter::once(table).chain(next_table).collect(),
            mod_count_override: Some(false),
        })
    }

    fn segmented_map(&self, class: ClassId) -> OverheadResult<FactorySpec> {
        let heap_class = self.model.class(class);
        let segments = resolve_field(heap_class, &["segments"])?;
        let segment_class = self
            .class(names::CONCURRENT_HASH_MAP_SEGMENT)
            .ok_or_else(|| DescriptorError::MissingClass(names::CONCURRENT_HASH_MAP_SEGMENT.to_string()))?;
        let segment_class = self.model.class(segment_class);
        let segment = SegmentFields {
            count: resolve_int_field(segment_class, &["count"])?,
            table: resolve_field(segment_class, &["table"])?,
            sync: resolve_optional(segment_class, &["sync"]),
            mod_count: resolve_mod_count(segment_class),
        };
        let impl_names = Self::with_arrays(&[names::CONCURRENT_HASH_MAP_SEGMENT, names::CONCURRENT_HASH_MAP_ENTRY]);
        Ok(FactorySpec {
            facts: self.map_facts(&impl_names, &[]),
            mod_count_override: Some(segment.mod_count.is_some()),
            shape: Shape::SegmentedMap(SegmentedMapShape {
                segments,
                segment,
                nodes: NodeLayouts::new(NodeNames::MAP),
            }),
            default_capacity: 256,
            known_fields: vec![segments],
        })
    }
}
