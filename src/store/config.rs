use crate::core::{BindError, ObjectSchema, Result, Schema, SchemaVersion};
use crate::object::Model;
use crate::storage::{MemoryEngine, NativeConfig, StorageEngine};
use crate::store::Store;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Length in bytes an encryption key must have.
pub const ENCRYPTION_KEY_LEN: usize = 64;

/// Migration callback. Receives the old store (read-only, old schema) and
/// the new store (inside the migration's write transaction).
pub type MigrationCallback = Arc<dyn Fn(&Store, &Store) -> Result<()> + Send + Sync>;

/// Store configuration
///
/// # Examples
///
/// ```ignore
/// let config = StoreConfig::new("people.store")
///     .schema_version(2)
///     .add_type::<Person>()
///     .migration_callback(|old, new| Ok(()));
/// ```
#[derive(Clone)]
pub struct StoreConfig {
    /// Location of the store file, or its name for in-memory stores
    pub path: PathBuf,

    pub read_only: bool,

    /// Keep the store in memory only; it disappears with its last instance
    pub in_memory: bool,

    pub encryption_key: Option<Vec<u8>>,

    /// Version the declared schema corresponds to
    pub schema_version: SchemaVersion,

    /// Declared object types. Empty means the store is opened dynamically
    /// against whatever schema it already holds.
    pub schema: Schema,

    pub migration_callback: Option<MigrationCallback>,

    /// Destroy and recreate the store instead of failing or migrating
    /// automatically when the stored schema does not match
    pub delete_if_migration_needed: bool,

    pub(crate) model_types: HashMap<String, TypeId>,
    engine: Option<Arc<dyn StorageEngine>>,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            read_only: false,
            in_memory: false,
            encryption_key: None,
            schema_version: SchemaVersion::UNVERSIONED,
            schema: Schema::default(),
            migration_callback: None,
            delete_if_migration_needed: false,
            model_types: HashMap::new(),
            engine: None,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    /// Set the encryption key; it must be exactly 64 bytes.
    pub fn encryption_key(mut self, key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.len() != ENCRYPTION_KEY_LEN {
            return Err(BindError::InvalidConfig(format!(
                "Encryption key must be {} bytes, got {}",
                ENCRYPTION_KEY_LEN,
                key.len()
            )));
        }
        self.encryption_key = Some(key);
        Ok(self)
    }

    pub fn schema_version(mut self, version: u64) -> Self {
        self.schema_version = SchemaVersion::new(version);
        self
    }

    /// Declare a model type. Its manifest becomes part of the schema.
    pub fn add_type<T: Model>(mut self) -> Self {
        self.schema.upsert(T::object_schema());
        self.model_types
            .insert(T::TYPE_NAME.to_string(), TypeId::of::<T>());
        self
    }

    /// Declare an object type with no model type behind it.
    pub fn add_object_schema(mut self, object: ObjectSchema) -> Self {
        self.model_types.remove(&object.name);
        self.schema.upsert(object);
        self
    }

    pub fn migration_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Store, &Store) -> Result<()> + Send + Sync + 'static,
    {
        self.migration_callback = Some(Arc::new(callback));
        self
    }

    pub fn delete_if_migration_needed(mut self, delete: bool) -> Self {
        self.delete_if_migration_needed = delete;
        self
    }

    /// Use a specific engine instead of the process-wide one.
    pub fn engine(mut self, engine: Arc<dyn StorageEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.schema.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(BindError::InvalidConfig("Store path cannot be empty".to_string()));
        }
        if self.read_only && self.delete_if_migration_needed {
            return Err(BindError::InvalidConfig(
                "A read-only store cannot be deleted on migration".to_string(),
            ));
        }
        self.schema.validate()
    }

    pub(crate) fn storage_engine(&self) -> Arc<dyn StorageEngine> {
        match &self.engine {
            Some(engine) => Arc::clone(engine),
            None => MemoryEngine::shared(),
        }
    }

    pub(crate) fn native(&self) -> NativeConfig {
        NativeConfig {
            path: self.path.clone(),
            read_only: self.read_only,
            in_memory: self.in_memory,
            encryption_key: self.encryption_key.clone(),
        }
    }

    /// Read-only, untyped view of the same file. Used for the old side of
    /// a migration.
    pub(crate) fn dynamic_view(&self) -> Self {
        Self {
            path: self.path.clone(),
            read_only: true,
            in_memory: self.in_memory,
            encryption_key: self.encryption_key.clone(),
            schema_version: SchemaVersion::UNVERSIONED,
            schema: Schema::default(),
            migration_callback: None,
            delete_if_migration_needed: false,
            model_types: HashMap::new(),
            engine: self.engine.clone(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .field("in_memory", &self.in_memory)
            .field("encrypted", &self.encryption_key.is_some())
            .field("schema_version", &self.schema_version)
            .field("object_types", &self.schema.objects().len())
            .field("migration_callback", &self.migration_callback.is_some())
            .field("delete_if_migration_needed", &self.delete_if_migration_needed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_key_length() {
        assert!(StoreConfig::new("a").encryption_key(vec![0u8; 32]).is_err());
        let config = StoreConfig::new("a").encryption_key(vec![7u8; 64]).unwrap();
        assert_eq!(config.encryption_key.as_ref().map(Vec::len), Some(64));
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::new("defaults.store");
        assert!(!config.read_only);
        assert!(!config.in_memory);
        assert!(config.is_dynamic());
        assert_eq!(config.schema_version, SchemaVersion::UNVERSIONED);
        assert!(!config.delete_if_migration_needed);
    }

    #[test]
    fn test_validate_rejects_read_only_recreate() {
        let config = StoreConfig::new("x")
            .read_only(true)
            .delete_if_migration_needed(true);
        assert!(matches!(config.validate(), Err(BindError::InvalidConfig(_))));
    }
}
