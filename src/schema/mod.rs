//! Entity model: kinds, field specs, relations and the resolved registry.

pub mod entity;
pub mod lims;
pub mod registry;

pub use entity::EntityKind;
pub use lims::{EntitySpec, FieldSpec, FieldType, FULL_OPERATIONS, READ_ONLY_OPERATIONS};
pub use registry::SchemaRegistry;
