//! Names of collection classes and their implementation classes

#![allow(missing_docs)]

/// `java.lang.Object`
pub const OBJECT: &str = "java.lang.Object";

pub const HASH_MAP: &str = "java.util.HashMap";
pub const HASH_MAP_ENTRY: &str = "java.util.HashMap$Entry";
pub const HASH_MAP_NODE: &str = "java.util.HashMap$Node";
pub const HASH_MAP_TREE_NODE: &str = "java.util.HashMap$TreeNode";
pub const LINKED_HASH_MAP: &str = "java.util.LinkedHashMap";
pub const LINKED_HASH_MAP_ENTRY: &str = "java.util.LinkedHashMap$Entry";
pub const HASH_SET: &str = "java.util.HashSet";
pub const LINKED_HASH_SET: &str = "java.util.LinkedHashSet";
pub const TREE_SET: &str = "java.util.TreeSet";
pub const HASHTABLE: &str = "java.util.Hashtable";
pub const HASHTABLE_ENTRY: &str = "java.util.Hashtable$Entry";
pub const PROPERTIES: &str = "java.util.Properties";
pub const WEAK_HASH_MAP: &str = "java.util.WeakHashMap";
pub const WEAK_HASH_MAP_ENTRY: &str = "java.util.WeakHashMap$Entry";
pub const IDENTITY_HASH_MAP: &str = "java.util.IdentityHashMap";
pub const TREE_MAP: &str = "java.util.TreeMap";
pub const TREE_MAP_ENTRY: &str = "java.util.TreeMap$Entry";
pub const TREE_MAP_NODE: &str = "java.util.TreeMap$Node";
pub const ARRAY_LIST: &str = "java.util.ArrayList";
pub const VECTOR: &str = "java.util.Vector";
pub const STACK: &str = "java.util.Stack";
pub const ATTRIBUTE_LIST: &str = "javax.management.AttributeList";
pub const PRIORITY_QUEUE: &str = "java.util.PriorityQueue";
pub const ARRAY_DEQUE: &str = "java.util.ArrayDeque";
pub const LINKED_LIST: &str = "java.util.LinkedList";
pub const LINKED_LIST_ENTRY: &str = "java.util.LinkedList$Entry";
pub const LINKED_LIST_NODE: &str = "java.util.LinkedList$Node";
pub const ARRAY_BLOCKING_QUEUE: &str = "java.util.concurrent.ArrayBlockingQueue";
pub const CONCURRENT_HASH_MAP: &str = "java.util.concurrent.ConcurrentHashMap";
pub const CONCURRENT_HASH_MAP_SEGMENT: &str = "java.util.concurrent.ConcurrentHashMap$Segment";
pub const CONCURRENT_HASH_MAP_ENTRY: &str = "java.util.concurrent.ConcurrentHashMap$HashEntry";
pub const CONCURRENT_HASH_MAP_NODE: &str = "java.util.concurrent.ConcurrentHashMap$Node";
pub const CONCURRENT_LINKED_QUEUE: &str = "java.util.concurrent.ConcurrentLinkedQueue";
pub const CONCURRENT_LINKED_QUEUE_NODE: &str = "java.util.concurrent.ConcurrentLinkedQueue$Node";
pub const COPY_ON_WRITE_ARRAY_LIST: &str = "java.util.concurrent.CopyOnWriteArrayList";
pub const COPY_ON_WRITE_ARRAY_SET: &str = "java.util.concurrent.CopyOnWriteArraySet";

/// Static field present only in pre-tree-bin hash maps
pub const LEGACY_HASH_MAP_MARKER: &str = "ALTERNATIVE_HASHING_THRESHOLD_DEFAULT";

/// Dump name of an array of `class_name`: `[Lcom.Foo;`
pub fn array_of(class_name: &str) -> String {
    format!("[L{class_name};")
}

/// Other names under which a class appears in some runtimes.
///
/// Android renames entry classes and spells arrays as `Foo[]`.
pub fn alternative_names(class_name: &str) -> Vec<String> {
    let alternatives: &[&str] = match class_name {
        "java.util.HashMap$Entry" => &["java.util.HashMap$HashMapEntry"],
        "[Ljava.util.HashMap$Entry;" => &[
            "java.util.HashMap$Entry[]",
            "java.util.HashMap$HashMapEntry[]",
        ],
        "java.util.Hashtable$Entry" => &["java.util.Hashtable$HashtableEntry"],
        "[Ljava.util.Hashtable$Entry;" => &[
            "java.util.Hashtable$Entry[]",
            "java.util.Hashtable$HashtableEntry[]",
        ],
        "java.util.LinkedHashMap$Entry" => &["java.util.LinkedHashMap$LinkedEntry"],
        "[Ljava.util.LinkedHashMap$Entry;" => &["java.util.LinkedHashMap$LinkedEntry[]"],
        "java.util.LinkedList$Entry" => &["java.util.LinkedList$Link", "java.util.LinkedList$ListItr"],
        _ => return plain_array_alternative(class_name).into_iter().collect(),
    };
    alternatives.iter().map(|s| s.to_string()).collect()
}

fn plain_array_alternative(class_name: &str) -> Option<String> {
    let element = class_name.strip_prefix("[L")?.strip_suffix(';')?;
    Some(format!("{element}[]"))
}
