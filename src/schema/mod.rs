//! Declared entity schemas and the registry that holds them.

pub mod registry;
pub mod types;

pub use registry::Registry;
pub use types::{
    AttrType, Attribute, EntityOptions, EntitySchema, IndexDef, IndexKind, NumberKind, PRIMARY_KEY,
};
