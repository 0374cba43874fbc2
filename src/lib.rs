// ============================================================================
// rowbind Library
// ============================================================================
//
// Binds plain Rust objects to rows of an embedded transactional object store.
//
// Layers, leaves first:
// - storage: the raw-handle call surface of the engine, plus an in-process
//   reference engine
// - handles: owned wrappers that release engine resources exactly once
// - store: open/migrate, write transactions, per-type column metadata
// - object: standalone vs managed objects and their typed accessors
//
// ============================================================================

pub mod core;
pub mod handles;
pub mod object;
pub mod storage;
pub mod store;

mod macros;

#[doc(hidden)]
pub use paste;

pub use core::{
    BindError, ErrorKind, ObjectSchema, Property, PropertyType, Result, Schema, SchemaVersion,
    Value,
};
pub use object::{Binding, DynamicObject, Model, ObjectCore, ObjectList, PropertyValue};
pub use storage::{MemoryEngine, StorageEngine};
pub use store::{MigrationCallback, ObjectMetadata, Store, StoreConfig, WriteTransaction};
