//! Collection overhead descriptors
//!
//! Describes how the standard collection classes lay out their state in a
//! heap snapshot, so an analysis can ask any collection object for its
//! element count, the memory its implementation occupies and how sparse it
//! is, and can walk its elements without knowing the class.
//!
//! The [`Registry`] resolves the collection classes present in a snapshot
//! once; [`Registry::classify`] then yields an [`InstanceDescriptor`] per
//! collection object. Problem counters accumulate on the shared
//! [`ClassDescriptor`] of each class.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod class_desc;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod factory;
mod layout;
pub mod names;
pub mod problem;
pub mod registry;
mod shapes;
pub mod standalone;
pub mod visit;

pub use class_desc::{ClassDescriptor, ClassFacts, ClassOverhead, OverheadTable, ProblemCount};
pub use config::{LayoutDetection, OverheadConfig};
pub use descriptor::InstanceDescriptor;
pub use error::{DescriptorError, OverheadResult};
pub use factory::DescriptorFactory;
pub use problem::ProblemKind;
pub use registry::Registry;
pub use standalone::StandaloneArray;
pub use visit::{Flow, ImplementationVisitor, ListVisitor, MapVisitor};
