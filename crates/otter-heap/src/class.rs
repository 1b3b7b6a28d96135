//! Class table entries

use crate::object::{ClassId, FieldType, HeapValue};

/// An instance field declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: FieldType,
}

/// What instances of a class look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Plain object with named fields
    Instance,
    /// Array of references
    ObjectArray,
    /// Array of primitives
    ValueArray(FieldType),
}

/// A class in a snapshot
#[derive(Debug, Clone)]
pub struct HeapClass {
    pub(crate) name: String,
    pub(crate) superclass: Option<ClassId>,
    pub(crate) kind: ClassKind,
    /// All instance fields, superclass fields first
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) statics: Vec<(String, HeapValue)>,
    pub(crate) instance_size: u64,
}

impl HeapClass {
    /// Fully qualified class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct superclass
    pub fn superclass(&self) -> Option<ClassId> {
        self.superclass
    }

    /// Instance layout kind
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Whether instances are arrays
    pub fn is_array(&self) -> bool {
        !matches!(self.kind, ClassKind::Instance)
    }

    /// All instance fields including inherited ones, superclass fields first
    pub fn instance_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field at `index`
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Index of the most derived field called `name`
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().rposition(|f| f.name == name)
    }

    /// Index of the least derived field called `name`
    pub fn first_field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Whether an instance field called `name` exists
    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    /// Value of a static field
    pub fn static_field(&self, name: &str) -> Option<HeapValue> {
        self.statics
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Whether a static field called `name` exists
    pub fn has_static_field(&self, name: &str) -> bool {
        self.statics.iter().any(|(n, _)| n == name)
    }

    /// Shallow size of one instance (not meaningful for arrays)
    pub fn instance_size(&self) -> u64 {
        self.instance_size
    }
}

/// Builder describing a class to define in a snapshot
#[derive(Debug, Clone)]
pub struct ClassSpec {
    pub(crate) name: String,
    pub(crate) superclass: Option<ClassId>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) statics: Vec<(String, HeapValue)>,
}

impl ClassSpec {
    /// Start a class with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            fields: Vec::new(),
            statics: Vec::new(),
        }
    }

    /// Set the superclass; its fields precede the declared ones
    pub fn extends(mut self, superclass: ClassId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Declare an instance field
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            ty,
        });
        self
    }

    /// Declare a reference field
    pub fn object_field(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Object)
    }

    /// Declare a static field with its value
    pub fn static_field(mut self, name: impl Into<String>, value: HeapValue) -> Self {
        self.statics.push((name.into(), value));
        self
    }
}
