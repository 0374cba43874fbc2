pub mod config;
pub mod metadata;
pub mod migration;
pub mod transaction;

pub use config::{MigrationCallback, StoreConfig};
pub use metadata::ObjectMetadata;
pub use transaction::WriteTransaction;

use crate::core::{BindError, Result, Schema, SchemaVersion, Value};
use crate::handles::{RowHandle, StoreHandle};
use crate::object::{Binding, DynamicObject, Model, ObjectCore};
use crate::storage::{RawHandle, StringRead};
use metadata::MetadataRegistry;
use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::{info, trace, warn};

/// Initial size of the string scratch buffer, in UTF-16 units.
pub const INITIAL_SCRATCH_CAPACITY: usize = 128;

pub struct StoreInner {
    metadata: MetadataRegistry,
    /// Reused for every string read on this instance. Grows, never shrinks.
    scratch: Mutex<Vec<u16>>,
    config: StoreConfig,
    handle: StoreHandle,
}

/// One open store instance.
///
/// Cloning is cheap and yields the same instance. The instance closes when
/// the last clone is dropped; managed objects do not keep it alive.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens a store, reconciling the declared schema with the stored one.
    pub fn open(config: StoreConfig) -> Result<Store> {
        migration::open(config)
    }

    /// Wraps an opened instance once its schema is final.
    pub(crate) fn assemble(handle: StoreHandle, config: StoreConfig) -> Result<Store> {
        let metadata = if config.is_dynamic() {
            metadata::build_registry(&handle, &handle.schema()?, &config.model_types)?
        } else {
            metadata::build_registry(&handle, &config.schema, &config.model_types)?
        };
        info!(
            path = ?config.path,
            read_only = config.read_only,
            object_types = metadata.len(),
            "store opened"
        );
        Ok(Store {
            inner: Arc::new(StoreInner {
                metadata,
                scratch: Mutex::new(vec![0; INITIAL_SCRATCH_CAPACITY]),
                config,
                handle,
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Store {
        Store { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<StoreInner> {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn handle(&self) -> &StoreHandle {
        &self.inner.handle
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Schema as currently stored.
    pub fn schema(&self) -> Result<Schema> {
        self.inner.handle.schema()
    }

    pub fn schema_version(&self) -> Result<SchemaVersion> {
        self.inner.handle.schema_version()
    }

    pub fn is_in_transaction(&self) -> Result<bool> {
        self.inner.handle.is_in_transaction()
    }

    pub fn begin_write(&self) -> Result<WriteTransaction<'_>> {
        WriteTransaction::begin(self)
    }

    /// Runs `f` inside a write transaction, committing if it returns `Ok`.
    pub fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Store) -> Result<R>,
    {
        let transaction = self.begin_write()?;
        let result = f(self)?;
        transaction.commit()?;
        Ok(result)
    }

    pub(crate) fn ensure_in_transaction(&self) -> Result<()> {
        if self.is_in_transaction()? {
            Ok(())
        } else {
            Err(BindError::NotInTransaction)
        }
    }

    pub fn is_same_instance(&self, other: &Store) -> Result<bool> {
        self.inner
            .handle
            .engine()
            .store_is_same_instance(self.inner.handle.raw()?, other.inner.handle.raw()?)
    }

    /// Current size of the string scratch buffer, in UTF-16 units.
    pub fn scratch_capacity(&self) -> usize {
        self.inner.scratch.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn object_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.metadata.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn metadata(&self, object_type: &str) -> Result<Arc<ObjectMetadata>> {
        self.inner
            .metadata
            .get(object_type)
            .cloned()
            .ok_or_else(|| BindError::UnknownObjectType(object_type.to_string()))
    }

    pub(crate) fn metadata_for<T: Model>(&self) -> Result<Arc<ObjectMetadata>> {
        let metadata = self.metadata(T::TYPE_NAME)?;
        match metadata.model_type {
            Some(model_type) if model_type != TypeId::of::<T>() => Err(BindError::TypeMismatch(
                format!("'{}' is registered for a different model type", T::TYPE_NAME),
            )),
            _ => Ok(metadata),
        }
    }

    fn bind_row(&self, row: RowHandle, metadata: &Arc<ObjectMetadata>) -> Binding {
        Binding::new(self, row, Arc::clone(metadata))
    }

    /// Adds an empty row and returns a managed object bound to it.
    pub fn create_object<T: Model>(&self) -> Result<T> {
        self.ensure_in_transaction()?;
        let metadata = self.metadata_for::<T>()?;
        let row = metadata.table.add_empty_row()?;
        Ok(T::from_core(ObjectCore::Managed(self.bind_row(row, &metadata))))
    }

    /// Binds a standalone object to a new row, copying its field values.
    ///
    /// Relation properties are not copied; lists start empty.
    pub fn manage<T: Model>(&self, object: &mut T) -> Result<()> {
        let ObjectCore::Standalone(fields) = object.core() else {
            return Err(BindError::AlreadyManaged);
        };
        self.ensure_in_transaction()?;
        let metadata = self.metadata_for::<T>()?;
        let binding = self.bind_row(metadata.table.add_empty_row()?, &metadata);

        let copied = metadata
            .object_schema
            .properties
            .iter()
            .filter(|p| !p.property_type.is_relation())
            .try_for_each(|property| {
                let value = fields
                    .value(&property.name)
                    .cloned()
                    .unwrap_or_else(|| property.default_value());
                binding.set_value(property, &value)
            });
        if let Err(e) = copied {
            if let Err(cleanup) = binding.row().remove() {
                warn!(error = %cleanup, "failed to remove partially managed row");
            }
            return Err(e);
        }

        trace!(object_type = T::TYPE_NAME, "object became managed");
        *object.core_mut() = ObjectCore::Managed(binding);
        Ok(())
    }

    pub fn all<T: Model>(&self) -> Result<Vec<T>> {
        let metadata = self.metadata_for::<T>()?;
        (0..metadata.table.size()?)
            .map(|index| {
                let row = metadata.table.row(index)?;
                Ok(T::from_core(ObjectCore::Managed(self.bind_row(row, &metadata))))
            })
            .collect()
    }

    pub fn all_dynamic(&self, object_type: &str) -> Result<Vec<DynamicObject>> {
        let metadata = self.metadata(object_type)?;
        (0..metadata.table.size()?)
            .map(|index| {
                let row = metadata.table.row(index)?;
                Ok(DynamicObject::new(self.bind_row(row, &metadata)))
            })
            .collect()
    }

    /// Looks an object up by its primary key.
    pub fn find<T: Model>(&self, key: impl Into<Value>) -> Result<Option<T>> {
        let metadata = self.metadata_for::<T>()?;
        let row = self.find_row(&metadata, key.into())?;
        Ok(row.map(|row| T::from_core(ObjectCore::Managed(self.bind_row(row, &metadata)))))
    }

    pub fn find_dynamic(
        &self,
        object_type: &str,
        key: impl Into<Value>,
    ) -> Result<Option<DynamicObject>> {
        let metadata = self.metadata(object_type)?;
        let row = self.find_row(&metadata, key.into())?;
        Ok(row.map(|row| DynamicObject::new(self.bind_row(row, &metadata))))
    }

    fn find_row(&self, metadata: &ObjectMetadata, key: Value) -> Result<Option<RowHandle>> {
        let primary = metadata.object_schema.primary_key().ok_or_else(|| {
            BindError::SchemaMismatch(format!(
                "'{}' has no primary key",
                metadata.object_type()
            ))
        })?;
        let column = metadata.column_index(&primary.name)?;
        match key {
            Value::Int(v) => metadata.table.find_first_int(column, v),
            Value::String(s) => metadata.table.find_first_string(column, &s),
            Value::Null => Err(BindError::NullIdentifier),
            other => Err(BindError::TypeMismatch(format!(
                "primary key of '{}' cannot be looked up by {}",
                metadata.object_type(),
                other.type_name()
            ))),
        }
    }

    /// Deletes the row behind a managed object.
    pub fn remove<T: Model>(&self, object: &T) -> Result<()> {
        let binding = object.core().binding()?;
        if !Arc::ptr_eq(binding.store()?.inner(), &self.inner) {
            return Err(BindError::AlreadyManaged);
        }
        binding.guard_write()?;
        binding.row().remove()
    }

    /// Reads a string cell through the scratch buffer, growing it once if
    /// the engine asks for more room.
    pub(crate) fn read_string(
        &self,
        row: RawHandle,
        column: usize,
        property: &str,
    ) -> Result<Option<String>> {
        let engine = self.inner.handle.engine();
        let mut buffer = self.inner.scratch.lock()?;
        let mut outcome = engine.object_get_string(row, column, buffer.as_mut_slice())?;
        if let StringRead::BufferTooSmall(required) = outcome {
            trace!(property, from = buffer.len(), to = required, "growing string scratch buffer");
            buffer.resize(required, 0);
            outcome = engine.object_get_string(row, column, buffer.as_mut_slice())?;
        }

        let corrupt = || BindError::CorruptData {
            property: property.to_string(),
        };
        match outcome {
            StringRead::Copied(len) => String::from_utf16(&buffer[..len])
                .map(Some)
                .map_err(|_| corrupt()),
            StringRead::Null => Ok(None),
            StringRead::TranscodeFailed => Err(corrupt()),
            StringRead::BufferTooSmall(required) => Err(BindError::Native(format!(
                "string in '{}' still needs {} units after growing the buffer",
                property, required
            ))),
        }
    }

    /// Deletes a closed store's backing file.
    pub fn delete_files(config: &StoreConfig) -> Result<()> {
        config.storage_engine().store_delete_files(&config.native())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.config.path)
            .field("handle", &self.inner.handle)
            .finish()
    }
}
