//! Owned wrappers around raw engine handles.
//!
//! A wrapper releases its resource exactly once: explicitly through
//! `unbind()`, or when it is dropped. Any access after that fails with
//! [`BindError::HandleReleased`].

use crate::core::{BindError, Result, Schema, SchemaVersion};
use crate::storage::{RawHandle, StorageEngine};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Store,
    Schema,
    Table,
    Row,
    List,
}

pub struct OpaqueHandle {
    engine: Arc<dyn StorageEngine>,
    raw: Option<RawHandle>,
    kind: HandleKind,
}

impl OpaqueHandle {
    pub fn bind(engine: Arc<dyn StorageEngine>, raw: RawHandle, kind: HandleKind) -> Self {
        Self {
            engine,
            raw: Some(raw),
            kind,
        }
    }

    pub fn raw(&self) -> Result<RawHandle> {
        self.raw.ok_or(BindError::HandleReleased)
    }

    pub fn is_bound(&self) -> bool {
        self.raw.is_some()
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// Whether both handles were issued by the same engine.
    pub fn same_engine(&self, other: &OpaqueHandle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.engine), Arc::as_ptr(&other.engine))
    }

    /// Releases the native resource. Safe to call more than once.
    pub fn unbind(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };
        match self.kind {
            HandleKind::Store => self.engine.store_destroy(raw),
            HandleKind::Schema => self.engine.schema_destroy(raw),
            HandleKind::Table => self.engine.table_destroy(raw),
            HandleKind::Row => self.engine.row_destroy(raw),
            HandleKind::List => self.engine.list_destroy(raw),
        }
    }
}

impl Drop for OpaqueHandle {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl PartialEq for OpaqueHandle {
    fn eq(&self, other: &Self) -> bool {
        self.raw.is_some() && self.raw == other.raw && self.same_engine(other)
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw {
            Some(raw) => write!(f, "{:?}({})", self.kind, raw),
            None => write!(f, "{:?}(released)", self.kind),
        }
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name(OpaqueHandle);

        impl $name {
            pub fn bind(engine: Arc<dyn StorageEngine>, raw: RawHandle) -> Self {
                Self(OpaqueHandle::bind(engine, raw, $kind))
            }

            pub fn raw(&self) -> Result<RawHandle> {
                self.0.raw()
            }

            pub fn engine(&self) -> &Arc<dyn StorageEngine> {
                self.0.engine()
            }

            pub fn unbind(&mut self) {
                self.0.unbind();
            }
        }
    };
}

typed_handle!(
    /// One open store instance.
    StoreHandle,
    HandleKind::Store
);
typed_handle!(SchemaHandle, HandleKind::Schema);
typed_handle!(
    /// The table backing one object type, scoped to one store instance.
    TableHandle,
    HandleKind::Table
);
typed_handle!(
    /// One row of one table of one open store instance.
    RowHandle,
    HandleKind::Row
);
typed_handle!(ListHandle, HandleKind::List);

impl PartialEq for StoreHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl StoreHandle {
    pub fn is_in_transaction(&self) -> Result<bool> {
        self.engine().store_is_in_transaction(self.raw()?)
    }

    pub fn schema_version(&self) -> Result<SchemaVersion> {
        self.engine().store_schema_version(self.raw()?)
    }

    pub fn schema(&self) -> Result<Schema> {
        let raw = self.engine().store_get_schema(self.raw()?)?;
        SchemaHandle::bind(Arc::clone(self.engine()), raw).get()
    }

    pub fn table(&self, object_type: &str) -> Result<Option<TableHandle>> {
        let table = self.engine().store_get_table(self.raw()?, object_type)?;
        Ok(table.map(|raw| TableHandle::bind(Arc::clone(self.engine()), raw)))
    }

    pub fn update_schema(&self, schema: &SchemaHandle, version: SchemaVersion) -> Result<()> {
        self.engine()
            .store_update_schema(self.raw()?, schema.raw()?, version)
    }
}

impl SchemaHandle {
    pub fn create(engine: Arc<dyn StorageEngine>, schema: &Schema) -> Result<Self> {
        let raw = engine.schema_create(schema)?;
        Ok(Self::bind(engine, raw))
    }

    pub fn try_clone(&self) -> Result<Self> {
        let raw = self.engine().schema_clone(self.raw()?)?;
        Ok(Self::bind(Arc::clone(self.engine()), raw))
    }

    pub fn get(&self) -> Result<Schema> {
        self.engine().schema_get(self.raw()?)
    }
}

impl TableHandle {
    pub fn column_index(&self, name: &str) -> Result<Option<usize>> {
        self.engine().table_get_column_index(self.raw()?, name)
    }

    pub fn add_empty_row(&self) -> Result<RowHandle> {
        let raw = self.engine().table_add_empty_row(self.raw()?)?;
        Ok(RowHandle::bind(Arc::clone(self.engine()), raw))
    }

    pub fn size(&self) -> Result<usize> {
        self.engine().table_size(self.raw()?)
    }

    pub fn row(&self, row_index: usize) -> Result<RowHandle> {
        let raw = self.engine().table_get_row(self.raw()?, row_index)?;
        Ok(RowHandle::bind(Arc::clone(self.engine()), raw))
    }

    pub fn find_first_int(&self, column: usize, value: i64) -> Result<Option<RowHandle>> {
        let found = self
            .engine()
            .table_find_first_int(self.raw()?, column, value)?;
        Ok(found.map(|raw| RowHandle::bind(Arc::clone(self.engine()), raw)))
    }

    pub fn find_first_string(&self, column: usize, value: &str) -> Result<Option<RowHandle>> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let found = self
            .engine()
            .table_find_first_string(self.raw()?, column, &units)?;
        Ok(found.map(|raw| RowHandle::bind(Arc::clone(self.engine()), raw)))
    }
}

impl RowHandle {
    /// Current position of the row. Always asks the engine; removals
    /// elsewhere in the table can move it.
    pub fn row_index(&self) -> Result<usize> {
        self.engine().row_get_row_index(self.raw()?)
    }

    /// False once the row was removed or its store closed.
    pub fn is_attached(&self) -> bool {
        self.raw()
            .and_then(|raw| self.engine().row_get_is_attached(raw))
            .unwrap_or(false)
    }

    pub fn table_key(&self) -> Result<u64> {
        self.engine().row_get_table_key(self.raw()?)
    }

    pub fn try_clone(&self) -> Result<Self> {
        let raw = self.engine().row_clone(self.raw()?)?;
        Ok(Self::bind(Arc::clone(self.engine()), raw))
    }

    pub fn remove(&self) -> Result<()> {
        self.engine().row_remove(self.raw()?)
    }
}

/// Rows are equal when they sit at the same position of the same table of
/// the same engine.
impl PartialEq for RowHandle {
    fn eq(&self, other: &Self) -> bool {
        if !self.0.same_engine(&other.0) {
            return false;
        }
        if self.0 == other.0 {
            return true;
        }
        let identity = |row: &RowHandle| -> Result<(u64, usize)> {
            Ok((row.table_key()?, row.row_index()?))
        };
        match (identity(self), identity(other)) {
            (Ok(lhs), Ok(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl ListHandle {
    pub fn size(&self) -> Result<usize> {
        self.engine().list_size(self.raw()?)
    }

    pub fn get(&self, index: usize) -> Result<RowHandle> {
        let raw = self.engine().list_get(self.raw()?, index)?;
        Ok(RowHandle::bind(Arc::clone(self.engine()), raw))
    }

    pub fn add(&self, target_row_index: usize) -> Result<()> {
        self.engine().list_add(self.raw()?, target_row_index)
    }

    pub fn insert(&self, index: usize, target_row_index: usize) -> Result<()> {
        self.engine().list_insert(self.raw()?, index, target_row_index)
    }

    pub fn erase(&self, index: usize) -> Result<()> {
        self.engine().list_erase(self.raw()?, index)
    }

    pub fn clear(&self) -> Result<()> {
        self.engine().list_clear(self.raw()?)
    }
}
