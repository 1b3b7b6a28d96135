//! Snapshots shaped like the collection classes of real runtimes

#![allow(dead_code)]

use otter_heap::{ClassId, ClassSpec, FieldType, HeapModel, HeapSnapshot, HeapValue, ObjectId};
use otter_overhead::names;

const O: FieldType = FieldType::Object;
const I: FieldType = FieldType::Int;
const J: FieldType = FieldType::Long;
const F: FieldType = FieldType::Float;
const Z: FieldType = FieldType::Boolean;

pub const STRING: &str = "java.lang.String";
pub const INTEGER: &str = "java.lang.Integer";
pub const REFERENCE: &str = "java.lang.ref.Reference";
pub const WEAK_REFERENCE: &str = "java.lang.ref.WeakReference";
pub const REENTRANT_LOCK: &str = "java.util.concurrent.locks.ReentrantLock";
pub const NONFAIR_SYNC: &str = "java.util.concurrent.locks.ReentrantLock$NonfairSync";
pub const CHM_FORWARDING_NODE: &str = "java.util.concurrent.ConcurrentHashMap$ForwardingNode";
pub const CHM_TREE_BIN: &str = "java.util.concurrent.ConcurrentHashMap$TreeBin";
pub const CHM_TREE_NODE: &str = "java.util.concurrent.ConcurrentHashMap$TreeNode";

pub fn obj(id: ObjectId) -> HeapValue {
    HeapValue::Object(id)
}

pub fn opt(id: Option<ObjectId>) -> HeapValue {
    id.map_or(HeapValue::Null, HeapValue::Object)
}

pub fn int(value: i32) -> HeapValue {
    HeapValue::Int(value)
}

/// Where a chained map keeps its parts
#[derive(Clone, Copy)]
pub struct ChainedMap {
    pub map: &'static str,
    pub node: &'static str,
    /// Element class of the bucket array
    pub table: &'static str,
    pub size: &'static str,
    pub key: &'static str,
    pub value: &'static str,
}

/// Snapshot under construction with the standard collection classes defined
pub struct Jdk {
    pub heap: HeapSnapshot,
    pub modern: bool,
}

impl Jdk {
    /// Runtime with tree-capable hash maps and a single-table concurrent map
    pub fn modern() -> Self {
        let mut jdk = Self::base(true);
        jdk.define(names::HASH_MAP, None, &[
            ("entrySet", O), ("table", O), ("size", I), ("modCount", I), ("threshold", I), ("loadFactor", F),
        ]);
        jdk.define(names::HASH_MAP_NODE, None, &[("hash", I), ("key", O), ("value", O), ("next", O)]);
        jdk.define(names::LINKED_HASH_MAP_ENTRY, Some(names::HASH_MAP_NODE), &[("before", O), ("after", O)]);
        jdk.define(names::HASH_MAP_TREE_NODE, Some(names::LINKED_HASH_MAP_ENTRY), &[
            ("parent", O), ("left", O), ("right", O), ("prev", O), ("red", Z),
        ]);
        jdk.array_class(names::HASH_MAP_NODE);
        jdk.define(names::LINKED_HASH_MAP, Some(names::HASH_MAP), &[("head", O), ("tail", O), ("accessOrder", Z)]);

        jdk.define(names::LINKED_LIST, None, &[("modCount", I), ("size", I), ("first", O), ("last", O)]);
        jdk.define(names::LINKED_LIST_NODE, None, &[("item", O), ("next", O), ("prev", O)]);

        jdk.define(names::CONCURRENT_HASH_MAP, None, &[
            ("table", O), ("nextTable", O), ("baseCount", J), ("sizeCtl", I),
        ]);
        jdk.define(names::CONCURRENT_HASH_MAP_NODE, None, &[("hash", I), ("key", O), ("val", O), ("next", O)]);
        jdk.define(CHM_FORWARDING_NODE, Some(names::CONCURRENT_HASH_MAP_NODE), &[("nextTable", O)]);
        jdk.define(CHM_TREE_BIN, Some(names::CONCURRENT_HASH_MAP_NODE), &[
            ("root", O), ("first", O), ("waiter", O), ("lockState", I),
        ]);
        jdk.define(CHM_TREE_NODE, Some(names::CONCURRENT_HASH_MAP_NODE), &[
            ("parent", O), ("left", O), ("right", O), ("prev", O), ("red", Z),
        ]);
        jdk.array_class(names::CONCURRENT_HASH_MAP_NODE);
        jdk
    }

    /// Runtime with chained hash maps, sentinel linked lists and a
    /// segmented concurrent map
    pub fn legacy() -> Self {
        let mut jdk = Self::base(false);
        let hash_map = ClassSpec::new(names::HASH_MAP)
            .static_field(names::LEGACY_HASH_MAP_MARKER, int(0x7fff_ffff))
            .object_field("entrySet")
            .object_field("table")
            .field("size", I)
            .field("threshold", I)
            .field("loadFactor", F)
            .field("modCount", I);
        jdk.heap.define_class(hash_map).unwrap();
        jdk.define(names::HASH_MAP_ENTRY, None, &[("key", O), ("value", O), ("next", O), ("hash", I)]);
        jdk.array_class(names::HASH_MAP_ENTRY);
        jdk.define(names::LINKED_HASH_MAP, Some(names::HASH_MAP), &[("header", O), ("accessOrder", Z)]);
        jdk.define(names::LINKED_HASH_MAP_ENTRY, Some(names::HASH_MAP_ENTRY), &[("before", O), ("after", O)]);

        jdk.define(names::LINKED_LIST, None, &[("header", O), ("size", I), ("modCount", I)]);
        jdk.define(names::LINKED_LIST_ENTRY, None, &[("element", O), ("next", O), ("previous", O)]);

        jdk.define(REENTRANT_LOCK, None, &[("sync", O)]);
        jdk.define(NONFAIR_SYNC, None, &[("state", I)]);
        jdk.define(names::CONCURRENT_HASH_MAP_SEGMENT, Some(REENTRANT_LOCK), &[
            ("count", I), ("modCount", I), ("threshold", I), ("table", O), ("loadFactor", F),
        ]);
        jdk.define(names::CONCURRENT_HASH_MAP_ENTRY, None, &[("key", O), ("hash", I), ("next", O), ("value", O)]);
        jdk.array_class(names::CONCURRENT_HASH_MAP_SEGMENT);
        jdk.array_class(names::CONCURRENT_HASH_MAP_ENTRY);
        jdk.define(names::CONCURRENT_HASH_MAP, None, &[
            ("segmentMask", I), ("segmentShift", I), ("segments", O), ("keySet", O), ("entrySet", O), ("values", O),
        ]);
        jdk
    }

    /// Classes laid out the same in every supported runtime
    fn base(modern: bool) -> Self {
        let mut jdk = Self {
            heap: HeapSnapshot::new(),
            modern,
        };
        jdk.define(names::OBJECT, None, &[]);
        jdk.define(STRING, None, &[("value", O), ("hash", I)]);
        jdk.define(INTEGER, None, &[("value", I)]);
        jdk.array_class(names::OBJECT);

        jdk.define(names::HASH_SET, None, &[("map", O)]);
        jdk.define(names::LINKED_HASH_SET, Some(names::HASH_SET), &[]);

        jdk.define(names::ARRAY_LIST, None, &[("modCount", I), ("elementData", O), ("size", I)]);
        jdk.define(names::ATTRIBUTE_LIST, Some(names::ARRAY_LIST), &[]);
        jdk.define(names::VECTOR, None, &[
            ("modCount", I), ("elementData", O), ("elementCount", I), ("capacityIncrement", I),
        ]);
        jdk.define(names::STACK, Some(names::VECTOR), &[]);

        jdk.define(names::TREE_MAP, None, &[("comparator", O), ("root", O), ("size", I), ("modCount", I)]);
        jdk.define(names::TREE_MAP_ENTRY, None, &[
            ("key", O), ("value", O), ("left", O), ("right", O), ("parent", O), ("color", Z),
        ]);
        jdk.define(names::TREE_SET, None, &[("m", O)]);

        jdk.define(names::HASHTABLE, None, &[
            ("table", O), ("count", I), ("threshold", I), ("loadFactor", F), ("modCount", I),
        ]);
        jdk.define(names::HASHTABLE_ENTRY, None, &[("hash", I), ("key", O), ("value", O), ("next", O)]);
        jdk.array_class(names::HASHTABLE_ENTRY);
        jdk.define(names::PROPERTIES, Some(names::HASHTABLE), &[("defaults", O)]);

        jdk.define(REFERENCE, None, &[("referent", O), ("queue", O), ("next", O), ("discovered", O)]);
        jdk.define(WEAK_REFERENCE, Some(REFERENCE), &[]);
        jdk.define(names::WEAK_HASH_MAP_ENTRY, Some(WEAK_REFERENCE), &[("value", O), ("hash", I), ("next", O)]);
        jdk.array_class(names::WEAK_HASH_MAP_ENTRY);
        jdk.define(names::WEAK_HASH_MAP, None, &[
            ("table", O), ("size", I), ("threshold", I), ("loadFactor", F), ("queue", O), ("modCount", I),
        ]);

        jdk.define(names::IDENTITY_HASH_MAP, None, &[("table", O), ("size", I), ("modCount", I)]);
        jdk.define(names::ARRAY_DEQUE, None, &[("elements", O), ("head", I), ("tail", I)]);
        jdk.define(names::PRIORITY_QUEUE, None, &[("queue", O), ("size", I), ("comparator", O), ("modCount", I)]);
        jdk.define(names::ARRAY_BLOCKING_QUEUE, None, &[
            ("items", O), ("takeIndex", I), ("putIndex", I), ("count", I), ("lock", O),
        ]);
        jdk.define(names::CONCURRENT_LINKED_QUEUE, None, &[("head", O), ("tail", O)]);
        jdk.define(names::CONCURRENT_LINKED_QUEUE_NODE, None, &[("item", O), ("next", O)]);
        jdk.define(names::COPY_ON_WRITE_ARRAY_LIST, None, &[("lock", O), ("array", O)]);
        jdk.define(names::COPY_ON_WRITE_ARRAY_SET, None, &[("al", O)]);
        jdk
    }

    pub fn define(&mut self, name: &str, parent: Option<&str>, fields: &[(&str, FieldType)]) -> ClassId {
        let mut spec = ClassSpec::new(name);
        if let Some(parent) = parent {
            spec = spec.extends(self.class(parent));
        }
        for (field, ty) in fields {
            spec = spec.field(*field, *ty);
        }
        self.heap.define_class(spec).unwrap()
    }

    fn array_class(&mut self, element: &str) -> ClassId {
        let name = names::array_of(element);
        match self.heap.class_by_name(&name) {
            Some(class) => class,
            None => self.heap.define_array_class(name, O).unwrap(),
        }
    }

    pub fn class(&self, name: &str) -> ClassId {
        self.heap
            .class_by_name(name)
            .unwrap_or_else(|| panic!("class {name} not defined"))
    }

    pub fn new_obj(&mut self, class: &str, values: &[(&str, HeapValue)]) -> ObjectId {
        let class = self.class(class);
        self.heap.add_instance_with(class, values).unwrap()
    }

    /// Reference array with `element` as its element class
    pub fn array(&mut self, element: &str, slots: &[Option<ObjectId>]) -> ObjectId {
        let class = self.array_class(element);
        self.heap
            .add_object_array(class, slots.iter().map(|s| opt(*s)).collect())
            .unwrap()
    }

    pub fn string(&mut self) -> ObjectId {
        self.new_obj(STRING, &[])
    }

    pub fn strings(&mut self, n: usize) -> Vec<ObjectId> {
        (0..n).map(|_| self.string()).collect()
    }

    pub fn integer(&mut self) -> ObjectId {
        self.new_obj(INTEGER, &[])
    }

    pub fn shallow(&self, obj: ObjectId) -> u64 {
        self.heap.shallow_size(obj)
    }

    /// Array-backed list with `elements` at the front of a backing array
    /// of `capacity` slots
    pub fn array_list(&mut self, class: &str, size_field: &str, elements: &[ObjectId], capacity: usize) -> ObjectId {
        let mut slots: Vec<Option<ObjectId>> = elements.iter().copied().map(Some).collect();
        slots.resize(capacity, None);
        let data = self.array(names::OBJECT, &slots);
        self.new_obj(class, &[
            ("elementData", obj(data)),
            (size_field, int(elements.len() as i32)),
        ])
    }

    pub fn hash_map_layout(&self) -> ChainedMap {
        let node = if self.modern { names::HASH_MAP_NODE } else { names::HASH_MAP_ENTRY };
        ChainedMap {
            map: names::HASH_MAP,
            node,
            table: node,
            size: "size",
            key: "key",
            value: "value",
        }
    }

    pub fn linked_hash_map_layout(&self) -> ChainedMap {
        ChainedMap {
            map: names::LINKED_HASH_MAP,
            node: names::LINKED_HASH_MAP_ENTRY,
            ..self.hash_map_layout()
        }
    }

    pub fn hashtable_layout() -> ChainedMap {
        ChainedMap {
            map: names::HASHTABLE,
            node: names::HASHTABLE_ENTRY,
            table: names::HASHTABLE_ENTRY,
            size: "count",
            key: "key",
            value: "value",
        }
    }

    pub fn weak_hash_map_layout() -> ChainedMap {
        ChainedMap {
            map: names::WEAK_HASH_MAP,
            node: names::WEAK_HASH_MAP_ENTRY,
            table: names::WEAK_HASH_MAP_ENTRY,
            size: "size",
            key: "referent",
            value: "value",
        }
    }

    /// Bucket chains for `(bucket, key, value)` triples; earlier triples
    /// come first in their chain
    fn chains(
        &mut self,
        layout: ChainedMap,
        capacity: usize,
        pairs: &[(usize, ObjectId, ObjectId)],
    ) -> Vec<Option<ObjectId>> {
        let mut heads: Vec<Option<ObjectId>> = vec![None; capacity];
        for &(bucket, key, value) in pairs.iter().rev() {
            let node = self.new_obj(layout.node, &[
                (layout.key, obj(key)),
                (layout.value, obj(value)),
                ("next", opt(heads[bucket])),
            ]);
            heads[bucket] = Some(node);
        }
        heads
    }

    pub fn chained_map(&mut self, layout: ChainedMap, capacity: usize, pairs: &[(usize, ObjectId, ObjectId)]) -> ObjectId {
        let heads = self.chains(layout, capacity, pairs);
        let table = self.array(layout.table, &heads);
        self.new_obj(layout.map, &[
            ("table", obj(table)),
            (layout.size, int(pairs.len() as i32)),
        ])
    }

    pub fn hash_map(&mut self, capacity: usize, pairs: &[(usize, ObjectId, ObjectId)]) -> ObjectId {
        let layout = self.hash_map_layout();
        self.chained_map(layout, capacity, pairs)
    }

    /// Hash set over a fresh map holding `elements` as keys
    pub fn hash_set(&mut self, capacity: usize, elements: &[ObjectId]) -> (ObjectId, ObjectId) {
        let present = self.new_obj(names::OBJECT, &[]);
        let pairs: Vec<_> = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (i % capacity, *e, present))
            .collect();
        let map = self.hash_map(capacity, &pairs);
        let set = self.new_obj(names::HASH_SET, &[("map", obj(map))]);
        (set, map)
    }

    /// Linked list of `items`; returns the list and its nodes in order
    pub fn linked_list(&mut self, items: &[ObjectId]) -> (ObjectId, Vec<ObjectId>) {
        if self.modern {
            let mut nodes = Vec::new();
            let mut prev = None;
            for item in items {
                let node = self.new_obj(names::LINKED_LIST_NODE, &[("item", obj(*item)), ("prev", opt(prev))]);
                if let Some(prev) = prev {
                    self.heap.set_field_by_name(prev, "next", obj(node)).unwrap();
                }
                prev = Some(node);
                nodes.push(node);
            }
            let list = self.new_obj(names::LINKED_LIST, &[
                ("first", opt(nodes.first().copied())),
                ("last", opt(nodes.last().copied())),
                ("size", int(items.len() as i32)),
            ]);
            (list, nodes)
        } else {
            // Circular chain through a sentinel header
            let header = self.new_obj(names::LINKED_LIST_ENTRY, &[]);
            let mut nodes = Vec::new();
            let mut prev = header;
            for item in items {
                let node = self.new_obj(names::LINKED_LIST_ENTRY, &[("element", obj(*item)), ("previous", obj(prev))]);
                self.heap.set_field_by_name(prev, "next", obj(node)).unwrap();
                prev = node;
                nodes.push(node);
            }
            self.heap.set_field_by_name(prev, "next", obj(header)).unwrap();
            self.heap.set_field_by_name(header, "previous", obj(prev)).unwrap();
            let list = self.new_obj(names::LINKED_LIST, &[
                ("header", obj(header)),
                ("size", int(items.len() as i32)),
            ]);
            nodes.insert(0, header);
            (list, nodes)
        }
    }

    /// Queue without a stored size; returns the queue and its nodes
    pub fn concurrent_queue(&mut self, items: &[Option<ObjectId>]) -> (ObjectId, Vec<ObjectId>) {
        let mut nodes: Vec<ObjectId> = Vec::new();
        for item in items.iter().rev() {
            let next = nodes.last().copied();
            let node = self.new_obj(names::CONCURRENT_LINKED_QUEUE_NODE, &[("item", opt(*item)), ("next", opt(next))]);
            nodes.push(node);
        }
        nodes.reverse();
        let queue = self.new_obj(names::CONCURRENT_LINKED_QUEUE, &[
            ("head", opt(nodes.first().copied())),
            ("tail", opt(nodes.last().copied())),
        ]);
        (queue, nodes)
    }

    /// Tree map over `pairs` as a balanced tree; returns the map and its
    /// nodes in key order
    pub fn tree_map(&mut self, pairs: &[(ObjectId, ObjectId)]) -> (ObjectId, Vec<ObjectId>) {
        let nodes: Vec<ObjectId> = pairs
            .iter()
            .map(|(k, v)| self.new_obj(names::TREE_MAP_ENTRY, &[("key", obj(*k)), ("value", obj(*v))]))
            .collect();
        let root = self.link_subtree(&nodes, None);
        let map = self.new_obj(names::TREE_MAP, &[("root", opt(root)), ("size", int(pairs.len() as i32))]);
        (map, nodes)
    }

    fn link_subtree(&mut self, nodes: &[ObjectId], parent: Option<ObjectId>) -> Option<ObjectId> {
        if nodes.is_empty() {
            return None;
        }
        let mid = nodes.len() / 2;
        let node = nodes[mid];
        self.heap.set_field_by_name(node, "parent", opt(parent)).unwrap();
        let left = self.link_subtree(&nodes[..mid], Some(node));
        let right = self.link_subtree(&nodes[mid + 1..], Some(node));
        self.heap.set_field_by_name(node, "left", opt(left)).unwrap();
        self.heap.set_field_by_name(node, "right", opt(right)).unwrap();
        Some(node)
    }

    /// Circular deque; `elements` fill slots from `head` onwards
    pub fn array_deque(&mut self, capacity: usize, head: usize, elements: &[ObjectId]) -> ObjectId {
        let mut slots = vec![None; capacity];
        for (i, e) in elements.iter().enumerate() {
            slots[(head + i) % capacity] = Some(*e);
        }
        let array = self.array(names::OBJECT, &slots);
        let tail = (head + elements.len()) % capacity;
        self.new_obj(names::ARRAY_DEQUE, &[
            ("elements", obj(array)),
            ("head", int(head as i32)),
            ("tail", int(tail as i32)),
        ])
    }

    /// Identity map with pairs at the given slot pairs of a table of
    /// `2 * pair_slots` references
    pub fn identity_map(&mut self, pair_slots: usize, pairs: &[(usize, ObjectId, ObjectId)]) -> ObjectId {
        let mut slots = vec![None; pair_slots * 2];
        for &(slot, key, value) in pairs {
            slots[slot * 2] = Some(key);
            slots[slot * 2 + 1] = Some(value);
        }
        let table = self.array(names::OBJECT, &slots);
        self.new_obj(names::IDENTITY_HASH_MAP, &[("table", obj(table)), ("size", int(pairs.len() as i32))])
    }

    /// Single-table concurrent map
    pub fn concurrent_map(&mut self, capacity: usize, pairs: &[(usize, ObjectId, ObjectId)]) -> ObjectId {
        let layout = ChainedMap {
            map: names::CONCURRENT_HASH_MAP,
            node: names::CONCURRENT_HASH_MAP_NODE,
            table: names::CONCURRENT_HASH_MAP_NODE,
            size: "baseCount",
            key: "key",
            value: "val",
        };
        let heads = self.chains(layout, capacity, pairs);
        let table = self.array(layout.table, &heads);
        self.new_obj(names::CONCURRENT_HASH_MAP, &[
            ("table", obj(table)),
            ("baseCount", HeapValue::Long(pairs.len() as i64)),
        ])
    }

    /// Segmented concurrent map; `None` segments were never created
    pub fn segmented_map(&mut self, segments: &[Option<(usize, Vec<(usize, ObjectId, ObjectId)>)>]) -> ObjectId {
        let layout = ChainedMap {
            map: names::CONCURRENT_HASH_MAP,
            node: names::CONCURRENT_HASH_MAP_ENTRY,
            table: names::CONCURRENT_HASH_MAP_ENTRY,
            size: "count",
            key: "key",
            value: "value",
        };
        let mut slots = Vec::new();
        for segment in segments {
            let Some((capacity, pairs)) = segment else {
                slots.push(None);
                continue;
            };
            let heads = self.chains(layout, *capacity, pairs);
            let table = self.array(layout.table, &heads);
            let sync = self.new_obj(NONFAIR_SYNC, &[]);
            slots.push(Some(self.new_obj(names::CONCURRENT_HASH_MAP_SEGMENT, &[
                ("sync", obj(sync)),
                ("table", obj(table)),
                ("count", int(pairs.len() as i32)),
                ("modCount", int(pairs.len() as i32)),
            ])));
        }
        let array = self.array(names::CONCURRENT_HASH_MAP_SEGMENT, &slots);
        self.new_obj(names::CONCURRENT_HASH_MAP, &[("segments", obj(array))])
    }
}

/// Records everything a traversal offers
#[derive(Default)]
pub struct Recorder {
    pub impl_objects: Vec<ObjectId>,
    pub elements: Vec<ObjectId>,
    pub entries: Vec<(Option<ObjectId>, Option<ObjectId>)>,
    /// Answer `Stop` after this many payload callbacks
    pub stop_after: Option<usize>,
}

impl Recorder {
    pub fn stopping_after(n: usize) -> Self {
        Self {
            stop_after: Some(n),
            ..Self::default()
        }
    }

    fn payload_flow(&self) -> otter_overhead::Flow {
        let seen = self.elements.len() + self.entries.len();
        match self.stop_after {
            Some(limit) if seen >= limit => otter_overhead::Flow::Stop,
            _ => otter_overhead::Flow::Continue,
        }
    }
}

impl otter_overhead::ImplementationVisitor for Recorder {
    fn scan_implementation_object(&mut self, obj: ObjectId) -> otter_overhead::Flow {
        if self.impl_objects.contains(&obj) {
            return otter_overhead::Flow::AlreadySeen;
        }
        self.impl_objects.push(obj);
        otter_overhead::Flow::Continue
    }
}

impl otter_overhead::ListVisitor for Recorder {
    fn scan_list_element(&mut self, element: ObjectId) -> otter_overhead::Flow {
        self.elements.push(element);
        self.payload_flow()
    }
}

impl otter_overhead::MapVisitor for Recorder {
    fn scan_map_entry(&mut self, key: Option<ObjectId>, value: Option<ObjectId>) -> otter_overhead::Flow {
        self.entries.push((key, value));
        self.payload_flow()
    }
}
