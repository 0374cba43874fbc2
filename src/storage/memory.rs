use super::engine::{NativeConfig, RawHandle, StorageEngine, StringRead};
use super::persistence::SnapshotManager;
use super::table::{Database, NativeValue, TableData};
use crate::core::{BindError, PropertyType, Result, Schema, SchemaVersion};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

lazy_static! {
    static ref SHARED_ENGINE: Arc<MemoryEngine> = Arc::new(MemoryEngine::new());
}

/// One store file shared by every instance opened on its path.
struct SharedFile {
    in_memory: bool,
    committed: Database,
    /// Instance currently holding the write transaction.
    writer: Option<RawHandle>,
    instances: usize,
    snapshots: Option<SnapshotManager>,
}

struct StoreState {
    path: PathBuf,
    read_only: bool,
    /// Private copy of the file while a write transaction is open.
    working: Option<Database>,
}

#[derive(Debug, Clone)]
struct TableRef {
    store: RawHandle,
    table: String,
}

#[derive(Debug, Clone)]
struct RowRef {
    store: RawHandle,
    table: String,
    key: u64,
}

#[derive(Debug, Clone)]
struct ListRef {
    row: RowRef,
    column: usize,
}

enum Resource {
    Store(StoreState),
    Schema(Schema),
    Table(TableRef),
    Row(RowRef),
    List(ListRef),
}

struct EngineState {
    files: HashMap<PathBuf, SharedFile>,
    resources: HashMap<usize, Resource>,
    next_handle: usize,
}

impl EngineState {
    fn allocate(&mut self, resource: Resource) -> RawHandle {
        let handle = RawHandle(self.next_handle);
        self.next_handle += 1;
        self.resources.insert(handle.0, resource);
        handle
    }

    fn store(&self, handle: RawHandle) -> Result<&StoreState> {
        match self.resources.get(&handle.0) {
            Some(Resource::Store(state)) => Ok(state),
            _ => Err(BindError::StoreClosed),
        }
    }

    fn store_mut(&mut self, handle: RawHandle) -> Result<&mut StoreState> {
        match self.resources.get_mut(&handle.0) {
            Some(Resource::Store(state)) => Ok(state),
            _ => Err(BindError::StoreClosed),
        }
    }

    fn file_of(&self, store: RawHandle) -> Result<&SharedFile> {
        let state = self.store(store)?;
        self.files
            .get(&state.path)
            .ok_or_else(|| BindError::Native(format!("Store file {:?} is not open", state.path)))
    }

    fn file_of_mut(&mut self, store: RawHandle) -> Result<&mut SharedFile> {
        let path = self.store(store)?.path.clone();
        self.files
            .get_mut(&path)
            .ok_or_else(|| BindError::Native(format!("Store file {:?} is not open", path)))
    }

    /// What `store` currently sees: its working copy inside a write
    /// transaction, the latest committed state otherwise.
    fn view(&self, store: RawHandle) -> Result<&Database> {
        let state = self.store(store)?;
        if let Some(working) = &state.working {
            return Ok(working);
        }
        Ok(&self.file_of(store)?.committed)
    }

    fn view_mut(&mut self, store: RawHandle) -> Result<&mut Database> {
        self.store_mut(store)?.working.as_mut().ok_or_else(|| {
            BindError::Native("Cannot modify the store outside a write transaction".to_string())
        })
    }

    fn table_ref(&self, handle: RawHandle) -> Result<TableRef> {
        match self.resources.get(&handle.0) {
            Some(Resource::Table(table)) => Ok(table.clone()),
            _ => Err(BindError::HandleReleased),
        }
    }

    fn row_ref(&self, handle: RawHandle) -> Result<RowRef> {
        match self.resources.get(&handle.0) {
            Some(Resource::Row(row)) => Ok(row.clone()),
            _ => Err(BindError::HandleReleased),
        }
    }

    fn list_ref(&self, handle: RawHandle) -> Result<ListRef> {
        match self.resources.get(&handle.0) {
            Some(Resource::List(list)) => Ok(list.clone()),
            _ => Err(BindError::HandleReleased),
        }
    }

    fn schema(&self, handle: RawHandle) -> Result<&Schema> {
        match self.resources.get(&handle.0) {
            Some(Resource::Schema(schema)) => Ok(schema),
            _ => Err(BindError::HandleReleased),
        }
    }

    fn table_data(&self, row: &RowRef) -> Result<&TableData> {
        self.view(row.store)?.table(&row.table)
    }

    fn read_cell(&self, handle: RawHandle, column: usize, expected: PropertyType) -> Result<NativeValue> {
        let row = self.row_ref(handle)?;
        let table = self.table_data(&row)?;
        check_type(table, column, expected)?;
        table.cell(row.key, column).cloned()
    }

    fn write_cell(
        &mut self,
        handle: RawHandle,
        column: usize,
        expected: PropertyType,
        value: NativeValue,
        unique: bool,
    ) -> Result<()> {
        let row = self.row_ref(handle)?;
        let table = self.view_mut(row.store)?.table_mut(&row.table)?;
        check_type(table, column, expected)?;
        if unique {
            table.set_unique(row.key, column, value)
        } else {
            *table.cell_mut(row.key, column)? = value;
            Ok(())
        }
    }

    fn new_row(&mut self, store: RawHandle, table: String, key: u64) -> RawHandle {
        self.allocate(Resource::Row(RowRef { store, table, key }))
    }

    /// Key of the row at `row_index` in the table `column` links to.
    fn link_target(&self, row: &RowRef, column: usize, row_index: usize) -> Result<(String, u64)> {
        let view = self.view(row.store)?;
        let property = view.table(&row.table)?.column(column)?;
        let target = property.object_type.clone().ok_or_else(|| {
            BindError::TypeMismatch(format!("Column '{}' is not a relation", property.name))
        })?;
        let key = view.table(&target)?.key_at(row_index)?;
        Ok((target, key))
    }

    fn link_list_mut(&mut self, list: &ListRef) -> Result<&mut Vec<u64>> {
        let table = self.view_mut(list.row.store)?.table_mut(&list.row.table)?;
        match table.cell_mut(list.row.key, list.column)? {
            NativeValue::LinkList(keys) => Ok(keys),
            _ => Err(BindError::TypeMismatch("Column is not a list".to_string())),
        }
    }

    fn link_list(&self, list: &ListRef) -> Result<(String, Vec<u64>)> {
        let table = self.table_data(&list.row)?;
        let target = table.column(list.column)?.object_type.clone().unwrap_or_default();
        match table.cell(list.row.key, list.column)? {
            NativeValue::LinkList(keys) => Ok((target, keys.clone())),
            _ => Err(BindError::TypeMismatch("Column is not a list".to_string())),
        }
    }
}

fn check_type(table: &TableData, column: usize, expected: PropertyType) -> Result<()> {
    let property = table.column(column)?;
    if property.property_type != expected {
        return Err(BindError::TypeMismatch(format!(
            "Column '{}' has type {}, accessed as {}",
            property.name, property.property_type, expected
        )));
    }
    Ok(())
}

fn check_nullable(table: &TableData, column: usize) -> Result<()> {
    let property = table.column(column)?;
    if !property.nullable {
        return Err(BindError::ConstraintViolation(format!(
            "Column '{}' cannot be null",
            property.name
        )));
    }
    Ok(())
}

/// Checks that `config` may attach to an already loaded file.
fn admit(file: &mut SharedFile, config: &NativeConfig) -> Result<()> {
    if file.in_memory != config.in_memory {
        return Err(BindError::InvalidConfig(format!(
            "Store {:?} is already open with a different in-memory setting",
            config.path
        )));
    }
    let fingerprint = config.encryption_key.as_deref().map(key_fingerprint);
    match file.committed.key_fingerprint {
        Some(stored) if Some(stored) != fingerprint => Err(BindError::InvalidConfig(
            "Encryption key does not match the store file".to_string(),
        )),
        None if file.committed.schema.is_empty() => {
            file.committed.key_fingerprint = fingerprint;
            Ok(())
        }
        None if fingerprint.is_some() => Err(BindError::InvalidConfig(
            "Store file was not created with an encryption key".to_string(),
        )),
        _ => Ok(()),
    }
}

fn utf16_to_bytes(value: &[u16]) -> Result<Vec<u8>> {
    String::from_utf16(value)
        .map(String::into_bytes)
        .map_err(|e| BindError::TypeMismatch(format!("Invalid UTF-16 string: {}", e)))
}

/// FNV-1a; stable across builds so it can be stored in the file.
fn key_fingerprint(key: &[u8]) -> u64 {
    key.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// In-process storage engine. Stores can be file-backed (MessagePack
/// snapshots written on commit) or purely in memory.
pub struct MemoryEngine {
    state: Mutex<EngineState>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState {
                files: HashMap::new(),
                resources: HashMap::new(),
                next_handle: 1,
            }),
        }
    }

    /// Process-wide engine used when a config names none.
    pub fn shared() -> Arc<MemoryEngine> {
        Arc::clone(&SHARED_ENGINE)
    }

    /// Number of live handles of any kind.
    pub fn live_handles(&self) -> usize {
        self.state.lock().map(|s| s.resources.len()).unwrap_or_default()
    }

    /// Overwrites a string cell with arbitrary bytes, bypassing UTF-16
    /// validation. Lets tests simulate a damaged file.
    #[doc(hidden)]
    pub fn debug_write_raw_string(&self, row: RawHandle, column: usize, bytes: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::String, NativeValue::String(bytes), false)
    }

    fn release(&self, handle: RawHandle) {
        if let Ok(mut state) = self.state.lock() {
            state.resources.remove(&handle.0);
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryEngine {
    fn store_open(&self, config: &NativeConfig) -> Result<RawHandle> {
        let mut state = self.state.lock()?;

        if !state.files.contains_key(&config.path) {
            let (committed, snapshots) = if config.in_memory {
                (Database::new(), None)
            } else {
                let manager = SnapshotManager::new(&config.path);
                let loaded = manager.load()?;
                if loaded.is_none() && config.read_only {
                    return Err(BindError::ReadOnly(format!(
                        "Store file {:?} does not exist",
                        config.path
                    )));
                }
                (loaded.unwrap_or_default(), Some(manager))
            };
            state.files.insert(
                config.path.clone(),
                SharedFile {
                    in_memory: config.in_memory,
                    committed,
                    writer: None,
                    instances: 0,
                    snapshots,
                },
            );
        }

        let file = state
            .files
            .get_mut(&config.path)
            .ok_or_else(|| BindError::Native("Store file vanished during open".to_string()))?;
        if let Err(e) = admit(file, config) {
            if file.instances == 0 {
                state.files.remove(&config.path);
            }
            return Err(e);
        }
        file.instances += 1;

        let handle = state.allocate(Resource::Store(StoreState {
            path: config.path.clone(),
            read_only: config.read_only,
            working: None,
        }));
        debug!(store = %handle, path = ?config.path, read_only = config.read_only, "opened store instance");
        Ok(handle)
    }

    fn store_destroy(&self, store: RawHandle) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let Some(Resource::Store(closed)) = state.resources.remove(&store.0) else {
            return;
        };
        let mut evict = false;
        if let Some(file) = state.files.get_mut(&closed.path) {
            if file.writer == Some(store) {
                file.writer = None;
            }
            file.instances = file.instances.saturating_sub(1);
            evict = file.instances == 0;
        }
        if evict {
            state.files.remove(&closed.path);
        }
        debug!(store = %store, path = ?closed.path, "closed store instance");
    }

    fn store_is_same_instance(&self, lhs: RawHandle, rhs: RawHandle) -> Result<bool> {
        let state = self.state.lock()?;
        state.store(lhs)?;
        state.store(rhs)?;
        Ok(lhs == rhs)
    }

    fn store_schema_version(&self, store: RawHandle) -> Result<SchemaVersion> {
        let state = self.state.lock()?;
        Ok(state.view(store)?.schema_version)
    }

    fn store_get_schema(&self, store: RawHandle) -> Result<RawHandle> {
        let mut state = self.state.lock()?;
        let schema = state.view(store)?.schema.clone();
        Ok(state.allocate(Resource::Schema(schema)))
    }

    fn store_update_schema(
        &self,
        store: RawHandle,
        schema: RawHandle,
        version: SchemaVersion,
    ) -> Result<()> {
        let mut state = self.state.lock()?;
        let schema = state.schema(schema)?.clone();
        schema.validate()?;
        state.view_mut(store)?.apply_schema(&schema, version);
        Ok(())
    }

    fn store_begin_transaction(&self, store: RawHandle) -> Result<()> {
        let mut state = self.state.lock()?;
        let instance = state.store(store)?;
        if instance.read_only {
            return Err(BindError::ReadOnly(
                "Cannot begin a write transaction on a read-only store".to_string(),
            ));
        }
        if instance.working.is_some() {
            return Err(BindError::Native(
                "The store is already in a write transaction".to_string(),
            ));
        }
        let file = state.file_of_mut(store)?;
        if file.writer.is_some() {
            return Err(BindError::Native(
                "Another store instance holds the write transaction for this file".to_string(),
            ));
        }
        file.writer = Some(store);
        let working = file.committed.clone();
        state.store_mut(store)?.working = Some(working);
        trace!(store = %store, "began write transaction");
        Ok(())
    }

    fn store_commit_transaction(&self, store: RawHandle) -> Result<()> {
        let mut state = self.state.lock()?;
        let working = state.store_mut(store)?.working.take().ok_or_else(|| {
            BindError::Native("Cannot commit: no write transaction is open".to_string())
        })?;
        let file = state.file_of_mut(store)?;
        file.writer = None;
        if let Some(snapshots) = &file.snapshots {
            snapshots.save(&working)?;
        }
        file.committed = working;
        trace!(store = %store, "committed write transaction");
        Ok(())
    }

    fn store_cancel_transaction(&self, store: RawHandle) -> Result<()> {
        let mut state = self.state.lock()?;
        if state.store_mut(store)?.working.take().is_none() {
            return Err(BindError::Native(
                "Cannot cancel: no write transaction is open".to_string(),
            ));
        }
        state.file_of_mut(store)?.writer = None;
        trace!(store = %store, "cancelled write transaction");
        Ok(())
    }

    fn store_is_in_transaction(&self, store: RawHandle) -> Result<bool> {
        let state = self.state.lock()?;
        Ok(state.store(store)?.working.is_some())
    }

    fn store_get_table(&self, store: RawHandle, object_type: &str) -> Result<Option<RawHandle>> {
        let mut state = self.state.lock()?;
        if !state.view(store)?.tables.contains_key(object_type) {
            return Ok(None);
        }
        Ok(Some(state.allocate(Resource::Table(TableRef {
            store,
            table: object_type.to_string(),
        }))))
    }

    fn store_delete_files(&self, config: &NativeConfig) -> Result<()> {
        let mut state = self.state.lock()?;
        if let Some(file) = state.files.get(&config.path) {
            if file.instances > 0 {
                return Err(BindError::InvalidConfig(format!(
                    "Cannot delete store {:?} while it is open",
                    config.path
                )));
            }
            state.files.remove(&config.path);
        }
        if !config.in_memory {
            SnapshotManager::new(&config.path).delete()?;
        }
        Ok(())
    }

    fn schema_create(&self, schema: &Schema) -> Result<RawHandle> {
        schema.validate()?;
        let mut state = self.state.lock()?;
        Ok(state.allocate(Resource::Schema(schema.clone())))
    }

    fn schema_clone(&self, schema: RawHandle) -> Result<RawHandle> {
        let mut state = self.state.lock()?;
        let copy = state.schema(schema)?.clone();
        Ok(state.allocate(Resource::Schema(copy)))
    }

    fn schema_get(&self, schema: RawHandle) -> Result<Schema> {
        let state = self.state.lock()?;
        state.schema(schema).cloned()
    }

    fn schema_destroy(&self, schema: RawHandle) {
        self.release(schema);
    }

    fn table_get_column_index(&self, table: RawHandle, name: &str) -> Result<Option<usize>> {
        let state = self.state.lock()?;
        let table = state.table_ref(table)?;
        Ok(state.view(table.store)?.table(&table.table)?.column_index(name))
    }

    fn table_add_empty_row(&self, table: RawHandle) -> Result<RawHandle> {
        let mut state = self.state.lock()?;
        let table = state.table_ref(table)?;
        let key = state.view_mut(table.store)?.table_mut(&table.table)?.add_empty_row();
        Ok(state.new_row(table.store, table.table, key))
    }

    fn table_size(&self, table: RawHandle) -> Result<usize> {
        let state = self.state.lock()?;
        let table = state.table_ref(table)?;
        Ok(state.view(table.store)?.table(&table.table)?.len())
    }

    fn table_get_row(&self, table: RawHandle, row_index: usize) -> Result<RawHandle> {
        let mut state = self.state.lock()?;
        let table = state.table_ref(table)?;
        let key = state.view(table.store)?.table(&table.table)?.key_at(row_index)?;
        Ok(state.new_row(table.store, table.table, key))
    }

    fn table_find_first_int(
        &self,
        table: RawHandle,
        column: usize,
        value: i64,
    ) -> Result<Option<RawHandle>> {
        let mut state = self.state.lock()?;
        let table = state.table_ref(table)?;
        let data = state.view(table.store)?.table(&table.table)?;
        check_type(data, column, PropertyType::Int)?;
        let found = data.find_first(column, &NativeValue::Int(value));
        Ok(found.map(|key| state.new_row(table.store, table.table, key)))
    }

    fn table_find_first_string(
        &self,
        table: RawHandle,
        column: usize,
        value: &[u16],
    ) -> Result<Option<RawHandle>> {
        let needle = NativeValue::String(utf16_to_bytes(value)?);
        let mut state = self.state.lock()?;
        let table = state.table_ref(table)?;
        let data = state.view(table.store)?.table(&table.table)?;
        check_type(data, column, PropertyType::String)?;
        let found = data.find_first(column, &needle);
        Ok(found.map(|key| state.new_row(table.store, table.table, key)))
    }

    fn table_destroy(&self, table: RawHandle) {
        self.release(table);
    }

    fn row_get_row_index(&self, row: RawHandle) -> Result<usize> {
        let state = self.state.lock()?;
        let row = state.row_ref(row)?;
        state
            .table_data(&row)?
            .position(row.key)
            .ok_or_else(|| BindError::Native("Row is no longer attached".to_string()))
    }

    fn row_get_is_attached(&self, row: RawHandle) -> Result<bool> {
        let state = self.state.lock()?;
        let row = state.row_ref(row)?;
        Ok(state
            .table_data(&row)
            .ok()
            .and_then(|table| table.position(row.key))
            .is_some())
    }

    fn row_get_table_key(&self, row: RawHandle) -> Result<u64> {
        let state = self.state.lock()?;
        let row = state.row_ref(row)?;
        Ok(state.table_data(&row)?.table_key)
    }

    fn row_clone(&self, row: RawHandle) -> Result<RawHandle> {
        let mut state = self.state.lock()?;
        let row = state.row_ref(row)?;
        Ok(state.allocate(Resource::Row(row)))
    }

    fn row_remove(&self, row: RawHandle) -> Result<()> {
        let mut state = self.state.lock()?;
        let row = state.row_ref(row)?;
        state.view_mut(row.store)?.remove_row(&row.table, row.key)
    }

    fn row_destroy(&self, row: RawHandle) {
        self.release(row);
    }

    fn object_get_int64(&self, row: RawHandle, column: usize) -> Result<i64> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Int)? {
            NativeValue::Int(v) => Ok(v),
            _ => Ok(0),
        }
    }

    fn object_get_nullable_int64(&self, row: RawHandle, column: usize) -> Result<Option<i64>> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Int)? {
            NativeValue::Int(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn object_set_int64(&self, row: RawHandle, column: usize, value: i64) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::Int, NativeValue::Int(value), false)
    }

    fn object_set_int64_unique(&self, row: RawHandle, column: usize, value: i64) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::Int, NativeValue::Int(value), true)
    }

    fn object_get_bool(&self, row: RawHandle, column: usize) -> Result<bool> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Bool)? {
            NativeValue::Bool(v) => Ok(v),
            _ => Ok(false),
        }
    }

    fn object_get_nullable_bool(&self, row: RawHandle, column: usize) -> Result<Option<bool>> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Bool)? {
            NativeValue::Bool(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn object_set_bool(&self, row: RawHandle, column: usize, value: bool) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::Bool, NativeValue::Bool(value), false)
    }

    fn object_get_float(&self, row: RawHandle, column: usize) -> Result<f32> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Float)? {
            NativeValue::Float(v) => Ok(v),
            _ => Ok(0.0),
        }
    }

    fn object_get_nullable_float(&self, row: RawHandle, column: usize) -> Result<Option<f32>> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Float)? {
            NativeValue::Float(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn object_set_float(&self, row: RawHandle, column: usize, value: f32) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::Float, NativeValue::Float(value), false)
    }

    fn object_get_double(&self, row: RawHandle, column: usize) -> Result<f64> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Double)? {
            NativeValue::Double(v) => Ok(v),
            _ => Ok(0.0),
        }
    }

    fn object_get_nullable_double(&self, row: RawHandle, column: usize) -> Result<Option<f64>> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Double)? {
            NativeValue::Double(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn object_set_double(&self, row: RawHandle, column: usize, value: f64) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::Double, NativeValue::Double(value), false)
    }

    fn object_get_timestamp_milliseconds(&self, row: RawHandle, column: usize) -> Result<i64> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Date)? {
            NativeValue::Timestamp(v) => Ok(v),
            _ => Ok(0),
        }
    }

    fn object_get_nullable_timestamp_milliseconds(
        &self,
        row: RawHandle,
        column: usize,
    ) -> Result<Option<i64>> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Date)? {
            NativeValue::Timestamp(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    fn object_set_timestamp_milliseconds(
        &self,
        row: RawHandle,
        column: usize,
        value: i64,
    ) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::Date, NativeValue::Timestamp(value), false)
    }

    fn object_set_null(&self, row: RawHandle, column: usize) -> Result<()> {
        let mut state = self.state.lock()?;
        let target = state.row_ref(row)?;
        let table = state.view_mut(target.store)?.table_mut(&target.table)?;
        check_nullable(table, column)?;
        let property_type = table.column(column)?.property_type;
        if property_type.is_relation() {
            return Err(BindError::TypeMismatch(
                "Relations are cleared with the link calls".to_string(),
            ));
        }
        *table.cell_mut(target.key, column)? = NativeValue::Null;
        Ok(())
    }

    fn object_get_string(
        &self,
        row: RawHandle,
        column: usize,
        buffer: &mut [u16],
    ) -> Result<StringRead> {
        let state = self.state.lock()?;
        let bytes = match state.read_cell(row, column, PropertyType::String)? {
            NativeValue::String(bytes) => bytes,
            _ => return Ok(StringRead::Null),
        };
        let Ok(text) = std::str::from_utf8(&bytes) else {
            return Ok(StringRead::TranscodeFailed);
        };
        let required = text.encode_utf16().count();
        if required > buffer.len() {
            return Ok(StringRead::BufferTooSmall(required));
        }
        for (slot, unit) in buffer.iter_mut().zip(text.encode_utf16()) {
            *slot = unit;
        }
        Ok(StringRead::Copied(required))
    }

    fn object_set_string(&self, row: RawHandle, column: usize, value: &[u16]) -> Result<()> {
        let bytes = utf16_to_bytes(value)?;
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::String, NativeValue::String(bytes), false)
    }

    fn object_set_string_unique(
        &self,
        row: RawHandle,
        column: usize,
        value: &[u16],
    ) -> Result<()> {
        let bytes = utf16_to_bytes(value)?;
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::String, NativeValue::String(bytes), true)
    }

    fn object_get_binary(&self, row: RawHandle, column: usize) -> Result<Option<Vec<u8>>> {
        let state = self.state.lock()?;
        match state.read_cell(row, column, PropertyType::Data)? {
            NativeValue::Binary(bytes) => Ok(Some(bytes)),
            _ => Ok(None),
        }
    }

    fn object_set_binary(&self, row: RawHandle, column: usize, value: &[u8]) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(
            row,
            column,
            PropertyType::Data,
            NativeValue::Binary(value.to_vec()),
            false,
        )
    }

    fn object_get_link(&self, row: RawHandle, column: usize) -> Result<Option<RawHandle>> {
        let mut state = self.state.lock()?;
        let source = state.row_ref(row)?;
        let NativeValue::Link(Some(key)) = state.read_cell(row, column, PropertyType::Object)? else {
            return Ok(None);
        };
        let view = state.view(source.store)?;
        let target = view
            .table(&source.table)?
            .column(column)?
            .object_type
            .clone()
            .unwrap_or_default();
        if view.table(&target)?.position(key).is_none() {
            return Ok(None);
        }
        Ok(Some(state.new_row(source.store, target, key)))
    }

    fn object_set_link(
        &self,
        row: RawHandle,
        column: usize,
        target_row_index: usize,
    ) -> Result<()> {
        let mut state = self.state.lock()?;
        let source = state.row_ref(row)?;
        let (_, key) = state.link_target(&source, column, target_row_index)?;
        state.write_cell(row, column, PropertyType::Object, NativeValue::Link(Some(key)), false)
    }

    fn object_clear_link(&self, row: RawHandle, column: usize) -> Result<()> {
        let mut state = self.state.lock()?;
        state.write_cell(row, column, PropertyType::Object, NativeValue::Link(None), false)
    }

    fn object_get_linklist(&self, row: RawHandle, column: usize) -> Result<RawHandle> {
        let mut state = self.state.lock()?;
        let source = state.row_ref(row)?;
        check_type(state.table_data(&source)?, column, PropertyType::List)?;
        Ok(state.allocate(Resource::List(ListRef {
            row: source,
            column,
        })))
    }

    fn list_size(&self, list: RawHandle) -> Result<usize> {
        let state = self.state.lock()?;
        let list = state.list_ref(list)?;
        Ok(state.link_list(&list)?.1.len())
    }

    fn list_get(&self, list: RawHandle, index: usize) -> Result<RawHandle> {
        let mut state = self.state.lock()?;
        let list = state.list_ref(list)?;
        let (target, keys) = state.link_list(&list)?;
        let key = *keys
            .get(index)
            .ok_or_else(|| BindError::Native(format!("List index {} out of range", index)))?;
        Ok(state.new_row(list.row.store, target, key))
    }

    fn list_add(&self, list: RawHandle, target_row_index: usize) -> Result<()> {
        let mut state = self.state.lock()?;
        let list = state.list_ref(list)?;
        let (_, key) = state.link_target(&list.row, list.column, target_row_index)?;
        state.link_list_mut(&list)?.push(key);
        Ok(())
    }

    fn list_insert(&self, list: RawHandle, index: usize, target_row_index: usize) -> Result<()> {
        let mut state = self.state.lock()?;
        let list = state.list_ref(list)?;
        let (_, key) = state.link_target(&list.row, list.column, target_row_index)?;
        let keys = state.link_list_mut(&list)?;
        if index > keys.len() {
            return Err(BindError::Native(format!("List index {} out of range", index)));
        }
        keys.insert(index, key);
        Ok(())
    }

    fn list_erase(&self, list: RawHandle, index: usize) -> Result<()> {
        let mut state = self.state.lock()?;
        let list = state.list_ref(list)?;
        let keys = state.link_list_mut(&list)?;
        if index >= keys.len() {
            return Err(BindError::Native(format!("List index {} out of range", index)));
        }
        keys.remove(index);
        Ok(())
    }

    fn list_clear(&self, list: RawHandle) -> Result<()> {
        let mut state = self.state.lock()?;
        let list = state.list_ref(list)?;
        state.link_list_mut(&list)?.clear();
        Ok(())
    }

    fn list_destroy(&self, list: RawHandle) {
        self.release(list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ObjectSchema, Property};

    fn in_memory(name: &str) -> NativeConfig {
        NativeConfig {
            path: PathBuf::from(name),
            read_only: false,
            in_memory: true,
            encryption_key: None,
        }
    }

    fn people_schema() -> Schema {
        Schema::new(vec![
            ObjectSchema::new("Person")
                .with_property(Property::new("name", PropertyType::String).nullable(true))
                .with_property(Property::new("age", PropertyType::Int)),
        ])
    }

    fn open_with_schema(engine: &MemoryEngine, name: &str) -> RawHandle {
        let store = engine.store_open(&in_memory(name)).unwrap();
        let schema = engine.schema_create(&people_schema()).unwrap();
        engine.store_begin_transaction(store).unwrap();
        engine
            .store_update_schema(store, schema, SchemaVersion::new(1))
            .unwrap();
        engine.store_commit_transaction(store).unwrap();
        engine.schema_destroy(schema);
        store
    }

    #[test]
    fn test_string_read_reports_required_size() {
        let engine = MemoryEngine::new();
        let store = open_with_schema(&engine, "strings");
        let table = engine.store_get_table(store, "Person").unwrap().unwrap();
        engine.store_begin_transaction(store).unwrap();
        let row = engine.table_add_empty_row(table).unwrap();
        let text: Vec<u16> = "hello world".encode_utf16().collect();
        engine.object_set_string(row, 0, &text).unwrap();

        let mut small = [0u16; 4];
        assert_eq!(
            engine.object_get_string(row, 0, &mut small).unwrap(),
            StringRead::BufferTooSmall(11)
        );
        let mut big = [0u16; 16];
        assert_eq!(
            engine.object_get_string(row, 0, &mut big).unwrap(),
            StringRead::Copied(11)
        );
        assert_eq!(&big[..11], text.as_slice());

        engine.object_set_null(row, 0).unwrap();
        assert_eq!(
            engine.object_get_string(row, 0, &mut big).unwrap(),
            StringRead::Null
        );
        engine.store_cancel_transaction(store).unwrap();
    }

    #[test]
    fn test_writes_require_transaction() {
        let engine = MemoryEngine::new();
        let store = open_with_schema(&engine, "guarded");
        let table = engine.store_get_table(store, "Person").unwrap().unwrap();
        assert!(engine.table_add_empty_row(table).is_err());
    }

    #[test]
    fn test_single_writer_per_file() {
        let engine = MemoryEngine::new();
        let first = open_with_schema(&engine, "shared");
        let second = engine.store_open(&in_memory("shared")).unwrap();
        engine.store_begin_transaction(first).unwrap();
        assert!(engine.store_begin_transaction(second).is_err());
        engine.store_commit_transaction(first).unwrap();
        engine.store_begin_transaction(second).unwrap();
        engine.store_cancel_transaction(second).unwrap();
    }

    #[test]
    fn test_cancel_discards_changes() {
        let engine = MemoryEngine::new();
        let store = open_with_schema(&engine, "cancel");
        let table = engine.store_get_table(store, "Person").unwrap().unwrap();
        engine.store_begin_transaction(store).unwrap();
        engine.table_add_empty_row(table).unwrap();
        assert_eq!(engine.table_size(table).unwrap(), 1);
        engine.store_cancel_transaction(store).unwrap();
        assert_eq!(engine.table_size(table).unwrap(), 0);
    }

    #[test]
    fn test_in_memory_file_vanishes_after_last_close() {
        let engine = MemoryEngine::new();
        let store = open_with_schema(&engine, "ephemeral");
        engine.store_destroy(store);
        let reopened = engine.store_open(&in_memory("ephemeral")).unwrap();
        assert_eq!(
            engine.store_schema_version(reopened).unwrap(),
            SchemaVersion::UNVERSIONED
        );
    }

    #[test]
    fn test_transcode_failure() {
        let engine = MemoryEngine::new();
        let store = open_with_schema(&engine, "corrupt");
        let table = engine.store_get_table(store, "Person").unwrap().unwrap();
        engine.store_begin_transaction(store).unwrap();
        let row = engine.table_add_empty_row(table).unwrap();
        engine
            .debug_write_raw_string(row, 0, vec![0xff, 0xfe, 0x41])
            .unwrap();
        let mut buffer = [0u16; 8];
        assert_eq!(
            engine.object_get_string(row, 0, &mut buffer).unwrap(),
            StringRead::TranscodeFailed
        );
        engine.store_cancel_transaction(store).unwrap();
    }
}
