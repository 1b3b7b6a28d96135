//! Traversal callbacks and the guards that keep traversals finite

use std::ops::ControlFlow;

use otter_heap::{HeapModel, HeapValue, ObjectId};
use rustc_hash::FxHashSet;

/// Answer of a visitor to an offered object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Go on (descend into an implementation object)
    Continue,
    /// Object seen before: skip it and whatever hangs off it
    AlreadySeen,
    /// Abandon the whole traversal
    Stop,
}

/// Receives implementation objects (backing arrays, entries, nodes)
pub trait ImplementationVisitor {
    /// Offered before anything reachable from `obj`
    fn scan_implementation_object(&mut self, obj: ObjectId) -> Flow;
}

/// Receives list payload
pub trait ListVisitor: ImplementationVisitor {
    /// One element; null slots are never offered
    fn scan_list_element(&mut self, element: ObjectId) -> Flow;
}

/// Receives map payload
pub trait MapVisitor: ImplementationVisitor {
    /// One key/value pair
    fn scan_map_entry(&mut self, key: Option<ObjectId>, value: Option<ObjectId>) -> Flow;
}

/// Offer an implementation object; `Continue(true)` means descend
pub(crate) fn enter<V: ImplementationVisitor + ?Sized>(
    visitor: &mut V,
    obj: ObjectId,
) -> ControlFlow<(), bool> {
    match visitor.scan_implementation_object(obj) {
        Flow::Continue => ControlFlow::Continue(true),
        Flow::AlreadySeen => ControlFlow::Continue(false),
        Flow::Stop => ControlFlow::Break(()),
    }
}

/// Break only on `Stop`
pub(crate) fn payload(flow: Flow) -> ControlFlow<()> {
    match flow {
        Flow::Stop => ControlFlow::Break(()),
        Flow::Continue | Flow::AlreadySeen => ControlFlow::Continue(()),
    }
}

pub(crate) fn emit_element<V: ListVisitor + ?Sized>(visitor: &mut V, element: ObjectId) -> ControlFlow<()> {
    payload(visitor.scan_list_element(element))
}

pub(crate) fn emit_entry<V: MapVisitor + ?Sized>(
    visitor: &mut V,
    key: Option<ObjectId>,
    value: Option<ObjectId>,
) -> ControlFlow<()> {
    payload(visitor.scan_map_entry(key, value))
}

/// Objects already walked by one traversal
#[derive(Default)]
pub(crate) struct ChainGuard {
    seen: FxHashSet<ObjectId>,
}

impl ChainGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True the first time `obj` is offered
    pub(crate) fn first_visit(&mut self, obj: ObjectId) -> bool {
        self.seen.insert(obj)
    }
}

/// Successor of `current` through `link`, or `None` where the chain ends or
/// turns back on itself. A successor recorded at the same dump offset as
/// `current` is the same record read twice.
pub(crate) fn next_link(model: &dyn HeapModel, current: ObjectId, link: HeapValue) -> Option<ObjectId> {
    let next = link.as_object()?;
    if next == current || model.file_offset(next) == model.file_offset(current) {
        return None;
    }
    Some(next)
}

/// Presents the keys of a map traversal as list elements
pub(crate) struct KeysAsElements<'a> {
    pub(crate) inner: &'a mut dyn ListVisitor,
}

impl ImplementationVisitor for KeysAsElements<'_> {
    fn scan_implementation_object(&mut self, obj: ObjectId) -> Flow {
        self.inner.scan_implementation_object(obj)
    }
}

impl MapVisitor for KeysAsElements<'_> {
    fn scan_map_entry(&mut self, key: Option<ObjectId>, _value: Option<ObjectId>) -> Flow {
        match key {
            Some(key) => self.inner.scan_list_element(key),
            None => Flow::Continue,
        }
    }
}

/// Elements or pairs examined when sampling
pub const SAMPLE_SIZE: usize = 3;

/// Looks for a common runtime class among the first elements
pub(crate) struct ElementSampler<'a> {
    model: &'a dyn HeapModel,
    examined: usize,
    sample: Option<ObjectId>,
    mixed: bool,
}

impl<'a> ElementSampler<'a> {
    pub(crate) fn new(model: &'a dyn HeapModel) -> Self {
        Self {
            model,
            examined: 0,
            sample: None,
            mixed: false,
        }
    }

    pub(crate) fn result(&self) -> Option<ObjectId> {
        if self.mixed { None } else { self.sample }
    }
}

impl ImplementationVisitor for ElementSampler<'_> {
    fn scan_implementation_object(&mut self, _obj: ObjectId) -> Flow {
        Flow::Continue
    }
}

impl ListVisitor for ElementSampler<'_> {
    fn scan_list_element(&mut self, element: ObjectId) -> Flow {
        self.examined += 1;
        match self.sample {
            Some(prev) if self.model.class_of(prev) != self.model.class_of(element) => {
                self.mixed = true;
                return Flow::Stop;
            }
            _ => self.sample = Some(element),
        }
        if self.examined < SAMPLE_SIZE {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }
}

/// Looks for a common key class and, separately, a common value class
/// among the first pairs. A null key or value leaves its side unchanged.
pub(crate) struct EntrySampler<'a> {
    model: &'a dyn HeapModel,
    examined: usize,
    key: Option<ObjectId>,
    value: Option<ObjectId>,
}

impl<'a> EntrySampler<'a> {
    pub(crate) fn new(model: &'a dyn HeapModel) -> Self {
        Self {
            model,
            examined: 0,
            key: None,
            value: None,
        }
    }

    pub(crate) fn result(&self) -> (Option<ObjectId>, Option<ObjectId>) {
        (self.key, self.value)
    }

    fn merge(model: &dyn HeapModel, prev: Option<ObjectId>, next: ObjectId) -> Option<ObjectId> {
        prev.filter(|p| model.class_of(*p) == model.class_of(next)).map(|_| next)
    }
}

impl ImplementationVisitor for EntrySampler<'_> {
    fn scan_implementation_object(&mut self, _obj: ObjectId) -> Flow {
        Flow::Continue
    }
}

impl MapVisitor for EntrySampler<'_> {
    fn scan_map_entry(&mut self, key: Option<ObjectId>, value: Option<ObjectId>) -> Flow {
        self.examined += 1;
        if self.examined == 1 {
            self.key = key;
            self.value = value;
        } else {
            if let Some(key) = key {
                self.key = Self::merge(self.model, self.key, key);
            }
            if let Some(value) = value {
                self.value = Self::merge(self.model, self.value, value);
            }
        }
        if self.examined < SAMPLE_SIZE {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }
}
