//! Schema dialect: compiled nodes, local references, versioned patches and
//! the file-type registry.

mod effective;
mod node;
mod patch;
mod pointer;
mod registry;
mod version;

pub use effective::EffectiveSchema;
pub use node::{ExclusiveBound, Items, Pattern, PrimitiveType, Schema, SchemaNode};
pub use patch::{
    apply_change, ChangeAction, ChangeTarget, SchemaChange, VersionedChangeSet, VersionedSchema,
};
pub use pointer::{parse_target, remove_path, resolve_pointer, set_path};
pub use registry::{
    extract_format_version, load_schema_file, RegisteredSchema, SchemaError, SchemaRegistry,
};
pub use version::Version;
