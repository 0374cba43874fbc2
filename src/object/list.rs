use super::{Binding, Model, ObjectCore};
use crate::core::{BindError, Result};
use crate::handles::ListHandle;
use crate::store::{ObjectMetadata, Store};
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A to-many relation of a managed object.
///
/// Reads go straight to the engine; mutations need an open write
/// transaction and manage standalone items on the way in.
pub struct ObjectList<T: Model> {
    store: Store,
    list: ListHandle,
    metadata: Arc<ObjectMetadata>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Model> ObjectList<T> {
    pub(crate) fn new(store: Store, list: ListHandle, metadata: Arc<ObjectMetadata>) -> Result<Self> {
        let registered = metadata
            .model_type
            .is_none_or(|id| id == TypeId::of::<T>());
        if metadata.object_type() != T::TYPE_NAME || !registered {
            return Err(BindError::TypeMismatch(format!(
                "list holds {}, not {}",
                metadata.object_type(),
                T::TYPE_NAME
            )));
        }
        Ok(Self {
            store,
            list,
            metadata,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> Result<usize> {
        self.list.size()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: usize) -> Result<T> {
        let row = self.list.get(index)?;
        let binding = Binding::new(&self.store, row, Arc::clone(&self.metadata));
        Ok(T::from_core(ObjectCore::Managed(binding)))
    }

    /// Appends `item`, managing it into this list's store if needed.
    pub fn push(&self, item: &mut T) -> Result<()> {
        let row_index = self.prepare(item)?;
        self.list.add(row_index)
    }

    pub fn insert(&self, index: usize, item: &mut T) -> Result<()> {
        let row_index = self.prepare(item)?;
        self.list.insert(index, row_index)
    }

    /// Removes the entry at `index`. The target object itself stays.
    pub fn remove(&self, index: usize) -> Result<()> {
        self.store.ensure_in_transaction()?;
        self.list.erase(index)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.ensure_in_transaction()?;
        self.list.clear()
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        (0..self.len()?).map(|index| self.get(index)).collect()
    }

    fn prepare(&self, item: &mut T) -> Result<usize> {
        self.store.ensure_in_transaction()?;
        if !item.is_managed() {
            self.store.manage(item)?;
        }
        let binding = item.core().binding()?;
        let same_store = binding
            .store()
            .map(|owner| Arc::ptr_eq(owner.inner(), self.store.inner()))
            .unwrap_or(false);
        if !same_store {
            return Err(BindError::AlreadyManaged);
        }
        binding.row().row_index()
    }
}

impl<T: Model> fmt::Debug for ObjectList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectList")
            .field("object_type", &self.metadata.object_type())
            .field("list", &self.list)
            .finish()
    }
}
