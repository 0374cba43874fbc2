use crate::core::{BindError, Result};
use crate::handles::RowHandle;
use crate::storage::{RawHandle, StorageEngine};
use crate::store::{ObjectMetadata, Store, StoreInner};
use std::fmt;
use std::sync::{Arc, Weak};

/// Runtime state of a managed object: its store, its row and the column
/// layout of its type.
///
/// The store is held weakly; an object outliving its store fails with
/// [`BindError::StoreClosed`] instead of keeping the store open.
pub struct Binding {
    store: Weak<StoreInner>,
    row: RowHandle,
    metadata: Arc<ObjectMetadata>,
}

impl Binding {
    pub(crate) fn new(store: &Store, row: RowHandle, metadata: Arc<ObjectMetadata>) -> Self {
        Self {
            store: store.downgrade(),
            row,
            metadata,
        }
    }

    pub fn row(&self) -> &RowHandle {
        &self.row
    }

    pub fn metadata(&self) -> &ObjectMetadata {
        &self.metadata
    }

    pub fn store(&self) -> Result<Store> {
        self.store
            .upgrade()
            .map(Store::from_inner)
            .ok_or(BindError::StoreClosed)
    }

    /// Whether both bindings belong to the same store instance.
    pub fn shares_store(&self, other: &Binding) -> bool {
        Weak::ptr_eq(&self.store, &other.store)
    }

    /// Fails with `NotInTransaction` unless the owning store has an open
    /// write transaction.
    pub(crate) fn guard_write(&self) -> Result<Store> {
        let store = self.store()?;
        store.ensure_in_transaction()?;
        Ok(store)
    }

    pub(crate) fn column(&self, property: &str) -> Result<usize> {
        self.metadata.column_index(property)
    }

    pub(crate) fn raw(&self) -> Result<RawHandle> {
        self.row.raw()
    }

    pub(crate) fn engine(&self) -> &Arc<dyn StorageEngine> {
        self.row.engine()
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            store: Weak::clone(&self.store),
            row: self.row.try_clone()?,
            metadata: Arc::clone(&self.metadata),
        })
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.shares_store(other)
            && self.metadata.object_type() == other.metadata.object_type()
            && self.row == other.row
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("object_type", &self.metadata.object_type())
            .field("row", &self.row)
            .finish()
    }
}
