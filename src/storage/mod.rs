pub mod engine;
pub mod memory;
pub mod persistence;
pub mod table;

pub use engine::{NativeConfig, RawHandle, StorageEngine, StringRead};
pub use memory::MemoryEngine;
pub use persistence::SnapshotManager;
