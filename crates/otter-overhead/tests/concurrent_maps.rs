//! Single-table and segmented concurrent hash maps

mod common;

use common::{CHM_FORWARDING_NODE, CHM_TREE_BIN, CHM_TREE_NODE, Jdk, Recorder, int, obj};
use otter_heap::{HeapModel, HeapValue, ObjectId};
use otter_overhead::{LayoutDetection, OverheadConfig, Registry, names};

fn key_value(jdk: &mut Jdk) -> (ObjectId, ObjectId) {
    (jdk.string(), jdk.integer())
}

fn node(jdk: &mut Jdk, class: &str, next: Option<ObjectId>) -> ObjectId {
    let (key, value) = key_value(jdk);
    jdk.new_obj(class, &[("key", obj(key)), ("val", obj(value)), ("next", common::opt(next))])
}

/// Nodes hanging off a table, following `next`
fn chained(jdk: &Jdk, table: ObjectId) -> Vec<ObjectId> {
    let mut nodes = Vec::new();
    for slot in jdk.heap.slots(table) {
        let mut next = slot.as_object();
        while let Some(n) = next {
            nodes.push(n);
            next = jdk.heap.field_by_name(n, "next").unwrap().as_object();
        }
    }
    nodes
}

fn total(jdk: &Jdk, objects: &[ObjectId]) -> u64 {
    objects.iter().map(|o| jdk.shallow(*o)).sum()
}

#[test]
fn test_single_table_map() {
    let mut jdk = Jdk::modern();
    let entries: Vec<_> = [1, 1, 4]
        .iter()
        .map(|b| {
            let (k, v) = key_value(&mut jdk);
            (*b, k, v)
        })
        .collect();
    let map = jdk.concurrent_map(16, &entries);
    let table = jdk.heap.field_by_name(map, "table").unwrap().as_object().unwrap();
    let nodes = chained(&jdk, table);
    let registry = Registry::new(&jdk.heap);

    let d = registry.classify(map).unwrap();
    assert_eq!(d.num_elements(), 3);
    assert_eq!(d.impl_size(), jdk.shallow(map) + jdk.shallow(table) + total(&jdk, &nodes));
    assert_eq!(d.sparseness_overhead(8), Some(14 * 8));
    assert_eq!(d.capacity(), Some(16));
    assert!(!d.class_descriptor().can_determine_mod_count());
    assert!(d.class_descriptor().is_impl_class_name(names::CONCURRENT_HASH_MAP_NODE));

    let mut recorder = Recorder::default();
    d.iterate_map(&mut recorder);
    let expected: Vec<_> = entries.iter().map(|(_, k, v)| (Some(*k), Some(*v))).collect();
    assert_eq!(recorder.entries, expected);
}

#[test]
#[should_panic(expected = "cannot be determined")]
fn test_single_table_map_has_no_mod_count() {
    let mut jdk = Jdk::modern();
    let map = jdk.concurrent_map(4, &[]);
    let registry = Registry::new(&jdk.heap);
    registry.classify(map).unwrap().mod_count();
}

#[test]
fn test_map_during_resize() {
    let mut jdk = Jdk::modern();
    let moved_a = node(&mut jdk, names::CONCURRENT_HASH_MAP_NODE, None);
    let moved_b = node(&mut jdk, names::CONCURRENT_HASH_MAP_NODE, None);
    let next_table = jdk.array(names::CONCURRENT_HASH_MAP_NODE, &[
        Some(moved_a), None, None, None, Some(moved_b), None, None, None,
    ]);
    let forwarding = jdk.new_obj(CHM_FORWARDING_NODE, &[("nextTable", obj(next_table))]);
    let staying = node(&mut jdk, names::CONCURRENT_HASH_MAP_NODE, None);
    let table = jdk.array(names::CONCURRENT_HASH_MAP_NODE, &[Some(forwarding), Some(staying), None, None]);
    let map = jdk.new_obj(names::CONCURRENT_HASH_MAP, &[("table", obj(table)), ("nextTable", obj(next_table))]);
    let registry = Registry::new(&jdk.heap);

    let d = registry.classify(map).unwrap();
    assert_eq!(d.num_elements(), 3);
    assert_eq!(
        d.impl_size(),
        total(&jdk, &[map, table, next_table, forwarding, staying, moved_a, moved_b])
    );
    // Three live slots of twelve; the forwarded slot does not count
    assert_eq!(d.sparseness_overhead(8), Some(9 * 8));
    assert_eq!(d.capacity(), Some(12));

    let mut recorder = Recorder::default();
    d.iterate_map(&mut recorder);
    assert_eq!(recorder.entries.len(), 3);
    assert!(!recorder.impl_objects.contains(&forwarding));
}

#[test]
fn test_forwarded_slots_are_not_live() {
    let mut jdk = Jdk::modern();
    let moved: Vec<_> = (0..3).map(|_| node(&mut jdk, names::CONCURRENT_HASH_MAP_NODE, None)).collect();
    let next_table = jdk.array(names::CONCURRENT_HASH_MAP_NODE, &[
        Some(moved[0]), None, Some(moved[1]), None, Some(moved[2]), None, None, None,
    ]);
    let forwarding = jdk.new_obj(CHM_FORWARDING_NODE, &[("nextTable", obj(next_table))]);
    let staying = node(&mut jdk, names::CONCURRENT_HASH_MAP_NODE, None);
    let table = jdk.array(names::CONCURRENT_HASH_MAP_NODE, &[
        Some(forwarding), Some(forwarding), Some(forwarding), Some(staying),
    ]);
    let map = jdk.new_obj(names::CONCURRENT_HASH_MAP, &[("table", obj(table)), ("nextTable", obj(next_table))]);
    let registry = Registry::new(&jdk.heap);

    let d = registry.classify(map).unwrap();
    assert_eq!(d.num_elements(), 4);
    assert_eq!(d.capacity(), Some(12));
    // Counting the three forwarded slots would make seven of twelve live
    assert_eq!(d.sparseness_overhead(8), Some(8 * 8));
}

#[test]
fn test_tree_bin() {
    let mut jdk = Jdk::modern();
    let second = node(&mut jdk, CHM_TREE_NODE, None);
    let first = node(&mut jdk, CHM_TREE_NODE, Some(second));
    jdk.heap.set_field_by_name(first, "right", obj(second)).unwrap();
    jdk.heap.set_field_by_name(second, "parent", obj(first)).unwrap();
    let bin = jdk.new_obj(CHM_TREE_BIN, &[("root", obj(first)), ("first", obj(first))]);
    let plain = node(&mut jdk, names::CONCURRENT_HASH_MAP_NODE, None);
    let table = jdk.array(names::CONCURRENT_HASH_MAP_NODE, &[Some(bin), Some(plain), None, None]);
    let map = jdk.new_obj(names::CONCURRENT_HASH_MAP, &[("table", obj(table))]);
    let registry = Registry::new(&jdk.heap);

    let d = registry.classify(map).unwrap();
    assert_eq!(d.num_elements(), 3);
    assert_eq!(d.impl_size(), total(&jdk, &[map, table, bin, first, second, plain]));

    let mut recorder = Recorder::default();
    d.iterate_map(&mut recorder);
    assert_eq!(recorder.impl_objects, vec![table, bin, first, second, plain]);
    let key_of = |n: ObjectId| jdk.heap.field_by_name(n, "key").unwrap().as_object();
    let keys: Vec<_> = recorder.entries.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![key_of(first), key_of(second), key_of(plain)]);
}

#[test]
fn test_empty_table_overhead() {
    let mut jdk = Jdk::modern();
    let map = jdk.concurrent_map(16, &[]);
    let table = jdk.heap.field_by_name(map, "table").unwrap().as_object().unwrap();
    let registry = Registry::new(&jdk.heap);

    let d = registry.classify(map).unwrap();
    assert_eq!(d.num_elements(), 0);
    assert_eq!(d.sparseness_overhead(8), Some(16 * 8 + jdk.shallow(table)));
}

fn segment_pairs(jdk: &mut Jdk, buckets: &[usize]) -> Vec<(usize, ObjectId, ObjectId)> {
    buckets
        .iter()
        .map(|b| {
            let (k, v) = key_value(jdk);
            (*b, k, v)
        })
        .collect()
}

#[test]
fn test_segmented_map() {
    let mut jdk = Jdk::legacy();
    let full = segment_pairs(&mut jdk, &[0, 0]);
    let small = segment_pairs(&mut jdk, &[1]);
    let map = jdk.segmented_map(&[Some((4, full.clone())), None, Some((4, Vec::new())), Some((2, small.clone()))]);
    let registry = Registry::new(&jdk.heap);

    let array = jdk.heap.field_by_name(map, "segments").unwrap().as_object().unwrap();
    let mut parts = vec![map, array];
    let mut empty_segment_bytes = 0;
    for segment in jdk.heap.slots(array).iter().filter_map(|s| s.as_object()) {
        let table = jdk.heap.field_by_name(segment, "table").unwrap().as_object().unwrap();
        let sync = jdk.heap.field_by_name(segment, "sync").unwrap().as_object().unwrap();
        if jdk.heap.field_by_name(segment, "count") == Some(HeapValue::Int(0)) {
            empty_segment_bytes += jdk.shallow(segment) + jdk.shallow(table);
        }
        parts.extend([segment, sync, table]);
        parts.extend(chained(&jdk, table));
    }

    let d = registry.classify(map).unwrap();
    assert_eq!(d.num_elements(), 3);
    assert!(d.class_descriptor().can_determine_mod_count());
    assert_eq!(d.mod_count(), 3);
    assert_eq!(d.impl_size(), total(&jdk, &parts));
    assert_eq!(d.capacity(), Some(10));
    assert_eq!(d.sparseness_overhead(8), Some(7 * 8 + empty_segment_bytes));
    assert!(d.class_descriptor().is_impl_class_name(names::CONCURRENT_HASH_MAP_SEGMENT));

    let mut recorder = Recorder::default();
    d.iterate_map(&mut recorder);
    assert_eq!(recorder.impl_objects[0], array);
    // Traversal offers exactly what the size accounts for
    assert_eq!(jdk.shallow(map) + total(&jdk, &recorder.impl_objects), d.impl_size());
    let first_segment = recorder.impl_objects[1];
    let first_lock = jdk.heap.field_by_name(first_segment, "sync").unwrap().as_object().unwrap();
    assert_eq!(recorder.impl_objects[2], first_lock);
    let expected: Vec<_> = full
        .iter()
        .chain(&small)
        .map(|(_, k, v)| (Some(*k), Some(*v)))
        .collect();
    assert_eq!(recorder.entries, expected);
}

#[test]
fn test_segments_never_created() {
    let mut jdk = Jdk::legacy();
    let map = jdk.segmented_map(&[None, None]);
    let unset = jdk.new_obj(names::CONCURRENT_HASH_MAP, &[]);
    let registry = Registry::new(&jdk.heap);

    let d = registry.classify(map).unwrap();
    assert_eq!(d.num_elements(), 0);
    assert_eq!(d.mod_count(), 0);
    assert_eq!(d.sparseness_overhead(8), None);

    let d = registry.classify(unset).unwrap();
    assert_eq!(d.num_elements(), 0);
    assert_eq!(d.impl_size(), jdk.shallow(unset));
    assert_eq!(d.capacity(), None);
}

#[test]
fn test_forced_layout_without_matching_fields_is_unsupported() {
    let mut jdk = Jdk::modern();
    jdk.define("com.example.CachingMap", Some(names::CONCURRENT_HASH_MAP), &[]);
    let map = jdk.concurrent_map(4, &[]);
    let sub = jdk.new_obj("com.example.CachingMap", &[("sizeCtl", int(12))]);
    let config = OverheadConfig {
        concurrent_map_layout: LayoutDetection::Legacy,
        ..OverheadConfig::default()
    };
    let registry = Registry::build(&jdk.heap, config);

    assert!(registry.classify(map).is_none());
    assert!(registry.classify(sub).is_none());
    assert!(registry.class_descriptor_for(names::CONCURRENT_HASH_MAP).is_none());
    // Other classes are unaffected
    assert!(registry.class_descriptor_for(names::HASH_MAP).is_some());
}
