//! The schema graph.
//!
//! Classes with attributes, relationships and methods; multiple
//! inheritance by name with derived caches (transitive super- and
//! subclasses, flattened tables, value layout) rebuilt on mutation.
//! All mutation entry points live on [`crate::kernel::Kernel`], which
//! owns the class arena, takes the owning file's lock and emits the
//! change notifications declared here.

mod attribute;
mod class;
mod events;
mod method;
mod relationship;

#[cfg(test)]
mod tests;

pub use attribute::Attribute;
pub use class::{Class, ClassId, DataInfo};
pub use events::{ClassChange, EventEmitter, ObjectEvent, ReloadBatch, SchemaEvent};
pub use method::{Method, MethodImplementation};
pub use relationship::{HighCardinality, LowCardinality, Relationship};

pub(crate) use attribute::ATTRIBUTE_TAG;
pub(crate) use method::METHOD_TAG;
pub(crate) use relationship::RELATIONSHIP_TAG;

/// The declarable attribute types are the value kinds without the
/// runtime-only tags (`object`, `list`, resolved `uid`).
pub use crate::value::Kind as AttributeType;
