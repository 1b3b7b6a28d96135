//! Heap snapshot object model
//!
//! Classes, objects and field values of a parsed heap dump, behind the
//! [`HeapModel`] trait that analyses consume. [`HeapSnapshot`] keeps a
//! whole snapshot in memory.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod class;
pub mod error;
pub mod heap;
pub mod model;
pub mod object;

pub use class::{ClassKind, ClassSpec, FieldDescriptor, HeapClass};
pub use error::{HeapError, HeapResult};
pub use heap::{HeapConfig, HeapSnapshot};
pub use model::HeapModel;
pub use object::{ClassId, FieldType, HeapValue, ObjectHeader, ObjectId, flags};
