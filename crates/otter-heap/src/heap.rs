//! In-memory heap snapshot

use rustc_hash::FxHashMap;

use crate::class::{ClassKind, ClassSpec, FieldDescriptor, HeapClass};
use crate::error::{HeapError, HeapResult};
use crate::model::HeapModel;
use crate::object::{ClassId, FieldType, HeapValue, ObjectHeader, ObjectId};

/// Layout of the dumped runtime
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Reference size (default: 8)
    pub pointer_size: u32,
    /// Plain object header size (default: 16)
    pub object_header_size: u32,
    /// Array header size including the length (default: 24)
    pub array_header_size: u32,
    /// Object alignment (default: 8)
    pub object_alignment: u32,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            pointer_size: 8,
            object_header_size: 16,
            array_header_size: 24,
            object_alignment: 8,
        }
    }
}

impl HeapConfig {
    /// 64-bit runtime with compressed references
    pub fn compressed_oops() -> Self {
        Self {
            pointer_size: 4,
            object_header_size: 12,
            array_header_size: 16,
            object_alignment: 8,
        }
    }

    fn align(&self, size: u64) -> u64 {
        let alignment = self.object_alignment.max(1) as u64;
        size.div_ceil(alignment) * alignment
    }

    /// Shallow size of an instance with the given fields
    pub fn instance_size(&self, fields: &[FieldDescriptor]) -> u64 {
        let body: u64 = fields
            .iter()
            .map(|f| f.ty.size(self.pointer_size) as u64)
            .sum();
        self.align(self.object_header_size as u64 + body)
    }

    /// Shallow size of an array of `len` elements of `element`
    pub fn array_size(&self, element: FieldType, len: usize) -> u64 {
        let body = element.size(self.pointer_size) as u64 * len as u64;
        self.align(self.array_header_size as u64 + body)
    }
}

struct ObjectRecord {
    class: ClassId,
    slots: Box<[HeapValue]>,
    /// Element count of value arrays (their contents are not kept)
    value_len: usize,
    shallow_size: u64,
    file_offset: u64,
    header: ObjectHeader,
}

/// Heap snapshot held in memory.
///
/// Objects may reference objects added later; create them first and patch
/// the references with [`HeapSnapshot::set_field`].
pub struct HeapSnapshot {
    config: HeapConfig,
    classes: Vec<HeapClass>,
    class_index: FxHashMap<String, ClassId>,
    objects: Vec<ObjectRecord>,
    /// Offset handed to the next object
    next_offset: u64,
}

/// Offset of the first object record in a synthetic dump
const FIRST_RECORD_OFFSET: u64 = 0x20;

impl HeapSnapshot {
    /// Create an empty snapshot with the default layout
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    /// Create an empty snapshot with a custom layout
    pub fn with_config(config: HeapConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            class_index: FxHashMap::default(),
            objects: Vec::new(),
            next_offset: FIRST_RECORD_OFFSET,
        }
    }

    fn insert_class(&mut self, class: HeapClass) -> HeapResult<ClassId> {
        if self.class_index.contains_key(&class.name) {
            return Err(HeapError::DuplicateClass(class.name));
        }
        let id = ClassId::from_index(self.classes.len());
        #[cfg(feature = "heap_logging")]
        tracing::trace!(target: "otter::heap", class = %class.name, fields = class.fields.len(), "class defined");
        self.class_index.insert(class.name.clone(), id);
        self.classes.push(class);
        Ok(id)
    }

    fn checked_class(&self, id: ClassId) -> HeapResult<&HeapClass> {
        self.classes.get(id.index()).ok_or(HeapError::UnknownClass(id))
    }

    fn check_value(&self, value: HeapValue) -> HeapResult<()> {
        match value {
            HeapValue::Object(id) if id.index() >= self.objects.len() => {
                Err(HeapError::UnknownObject(id))
            }
            _ => Ok(()),
        }
    }

    /// Define an instance class
    pub fn define_class(&mut self, spec: ClassSpec) -> HeapResult<ClassId> {
        let mut fields = match spec.superclass {
            Some(sup) => self.checked_class(sup)?.fields.clone(),
            None => Vec::new(),
        };
        fields.extend(spec.fields);
        let instance_size = self.config.instance_size(&fields);
        self.insert_class(HeapClass {
            name: spec.name,
            superclass: spec.superclass,
            kind: ClassKind::Instance,
            fields,
            statics: spec.statics,
            instance_size,
        })
    }

    /// Define an array class
    pub fn define_array_class(
        &mut self,
        name: impl Into<String>,
        element: FieldType,
    ) -> HeapResult<ClassId> {
        let kind = if element.is_reference() {
            ClassKind::ObjectArray
        } else {
            ClassKind::ValueArray(element)
        };
        self.insert_class(HeapClass {
            name: name.into(),
            superclass: None,
            kind,
            fields: Vec::new(),
            statics: Vec::new(),
            instance_size: 0,
        })
    }

    fn push_object(
        &mut self,
        class: ClassId,
        slots: Box<[HeapValue]>,
        value_len: usize,
        shallow_size: u64,
    ) -> ObjectId {
        let id = ObjectId::from_index(self.objects.len());
        let file_offset = self.next_offset;
        self.next_offset += shallow_size.max(1);
        self.objects.push(ObjectRecord {
            class,
            slots,
            value_len,
            shallow_size,
            file_offset,
            header: ObjectHeader::new(),
        });
        id
    }

    /// Add an instance with all field values given in declaration order
    pub fn add_instance(&mut self, class: ClassId, values: Vec<HeapValue>) -> HeapResult<ObjectId> {
        let cls = self.checked_class(class)?;
        if cls.kind != ClassKind::Instance {
            return Err(HeapError::wrong_kind(format!("{} is an array class", cls.name)));
        }
        if cls.fields.len() != values.len() {
            return Err(HeapError::FieldCountMismatch {
                class: cls.name.clone(),
                expected: cls.fields.len(),
                actual: values.len(),
            });
        }
        let size = cls.instance_size;
        for value in &values {
            self.check_value(*value)?;
        }
        Ok(self.push_object(class, values.into_boxed_slice(), 0, size))
    }

    /// Add an instance with every field at its zero value
    pub fn add_default_instance(&mut self, class: ClassId) -> HeapResult<ObjectId> {
        let values = self
            .checked_class(class)?
            .fields
            .iter()
            .map(|f| f.ty.zero())
            .collect();
        self.add_instance(class, values)
    }

    /// Add an instance, setting the named fields and zeroing the rest
    pub fn add_instance_with(
        &mut self,
        class: ClassId,
        values: &[(&str, HeapValue)],
    ) -> HeapResult<ObjectId> {
        let obj = self.add_default_instance(class)?;
        for (name, value) in values {
            self.set_field_by_name(obj, name, *value)?;
        }
        Ok(obj)
    }

    /// Add an array of references
    pub fn add_object_array(
        &mut self,
        class: ClassId,
        elements: Vec<HeapValue>,
    ) -> HeapResult<ObjectId> {
        let cls = self.checked_class(class)?;
        if cls.kind != ClassKind::ObjectArray {
            return Err(HeapError::wrong_kind(format!("{} is not an object array class", cls.name)));
        }
        for value in &elements {
            self.check_value(*value)?;
        }
        let size = self.config.array_size(FieldType::Object, elements.len());
        Ok(self.push_object(class, elements.into_boxed_slice(), 0, size))
    }

    /// Add an array of `len` nulls
    pub fn add_null_array(&mut self, class: ClassId, len: usize) -> HeapResult<ObjectId> {
        self.add_object_array(class, vec![HeapValue::Null; len])
    }

    /// Add a primitive array; contents are not retained
    pub fn add_value_array(&mut self, class: ClassId, len: usize) -> HeapResult<ObjectId> {
        let cls = self.checked_class(class)?;
        let ClassKind::ValueArray(element) = cls.kind else {
            return Err(HeapError::wrong_kind(format!("{} is not a primitive array class", cls.name)));
        };
        let size = self.config.array_size(element, len);
        Ok(self.push_object(class, Box::default(), len, size))
    }

    /// Overwrite a field or array element
    pub fn set_field(&mut self, obj: ObjectId, index: usize, value: HeapValue) -> HeapResult<()> {
        self.check_value(value)?;
        let record = self
            .objects
            .get_mut(obj.index())
            .ok_or(HeapError::UnknownObject(obj))?;
        let len = record.slots.len();
        let slot = record
            .slots
            .get_mut(index)
            .ok_or(HeapError::SlotOutOfBounds { object: obj, index, len })?;
        *slot = value;
        Ok(())
    }

    /// Overwrite the most derived field called `name`
    pub fn set_field_by_name(&mut self, obj: ObjectId, name: &str, value: HeapValue) -> HeapResult<()> {
        let record = self.objects.get(obj.index()).ok_or(HeapError::UnknownObject(obj))?;
        let cls = &self.classes[record.class.index()];
        let index = cls.field_index(name).ok_or_else(|| HeapError::UnknownField {
            class: cls.name.clone(),
            field: name.to_string(),
        })?;
        self.set_field(obj, index, value)
    }

    /// Override the dump position of an object
    pub fn set_file_offset(&mut self, obj: ObjectId, offset: u64) -> HeapResult<()> {
        let record = self
            .objects
            .get_mut(obj.index())
            .ok_or(HeapError::UnknownObject(obj))?;
        record.file_offset = offset;
        Ok(())
    }

    /// Clear analysis flags on every object
    pub fn reset_flags(&self) {
        for record in &self.objects {
            record.header.reset();
        }
    }

    /// Sum of shallow sizes of all objects
    pub fn total_size(&self) -> u64 {
        self.objects.iter().map(|r| r.shallow_size).sum()
    }
}

impl Default for HeapSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapModel for HeapSnapshot {
    fn config(&self) -> &HeapConfig {
        &self.config
    }

    fn class_count(&self) -> usize {
        self.classes.len()
    }

    fn class(&self, id: ClassId) -> &HeapClass {
        &self.classes[id.index()]
    }

    fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_index.get(name).copied()
    }

    fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn class_of(&self, obj: ObjectId) -> ClassId {
        self.objects[obj.index()].class
    }

    fn slots(&self, obj: ObjectId) -> &[HeapValue] {
        &self.objects[obj.index()].slots
    }

    fn array_length(&self, obj: ObjectId) -> Option<usize> {
        let record = &self.objects[obj.index()];
        match self.classes[record.class.index()].kind {
            ClassKind::Instance => None,
            ClassKind::ObjectArray => Some(record.slots.len()),
            ClassKind::ValueArray(_) => Some(record.value_len),
        }
    }

    fn shallow_size(&self, obj: ObjectId) -> u64 {
        self.objects[obj.index()].shallow_size
    }

    fn file_offset(&self, obj: ObjectId) -> u64 {
        self.objects[obj.index()].file_offset
    }

    fn header(&self, obj: ObjectId) -> &ObjectHeader {
        &self.objects[obj.index()].header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HeapConfig::default();
        assert_eq!(config.pointer_size, 8);
        assert_eq!(config.array_size(FieldType::Object, 16), 24 + 128);
        assert_eq!(config.array_size(FieldType::Byte, 3), 32);
    }

    #[test]
    fn test_instance_size_is_aligned() {
        let config = HeapConfig::default();
        let fields = vec![
            FieldDescriptor { name: "a".into(), ty: FieldType::Int },
            FieldDescriptor { name: "b".into(), ty: FieldType::Object },
        ];
        assert_eq!(config.instance_size(&fields), 32);
    }

    #[test]
    fn test_offsets_follow_allocation_order() {
        let mut heap = HeapSnapshot::new();
        let cls = heap.define_class(ClassSpec::new("A").field("x", FieldType::Int)).unwrap();
        let a = heap.add_default_instance(cls).unwrap();
        let b = heap.add_default_instance(cls).unwrap();
        assert_eq!(heap.file_offset(a), FIRST_RECORD_OFFSET);
        assert_eq!(heap.file_offset(b), FIRST_RECORD_OFFSET + heap.shallow_size(a));
    }
}
