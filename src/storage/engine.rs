use crate::core::{Result, Schema, SchemaVersion};
use std::fmt;
use std::path::PathBuf;

/// Pointer-sized identifier of a native resource. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(pub usize);

impl RawHandle {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Outcome of reading a string column into a caller-supplied UTF-16 buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringRead {
    /// The value fit; this many UTF-16 units were written.
    Copied(usize),
    /// Nothing was written; the value needs this many UTF-16 units.
    BufferTooSmall(usize),
    /// The stored bytes are not valid UTF-8.
    TranscodeFailed,
    /// The column holds null.
    Null,
}

/// Parameters for opening one store instance.
#[derive(Debug, Clone)]
pub struct NativeConfig {
    pub path: PathBuf,
    pub read_only: bool,
    pub in_memory: bool,
    pub encryption_key: Option<Vec<u8>>,
}

/// The call surface of the native storage engine.
///
/// Every handle passed in was issued by the same engine. Handles are released
/// through the matching `*_destroy` call exactly once.
pub trait StorageEngine: Send + Sync {
    // ------------------------------------------------------------------
    // store
    // ------------------------------------------------------------------

    fn store_open(&self, config: &NativeConfig) -> Result<RawHandle>;
    fn store_destroy(&self, store: RawHandle);
    fn store_is_same_instance(&self, lhs: RawHandle, rhs: RawHandle) -> Result<bool>;
    fn store_schema_version(&self, store: RawHandle) -> Result<SchemaVersion>;
    fn store_get_schema(&self, store: RawHandle) -> Result<RawHandle>;
    /// Rewrites tables to match `schema` and records `version`.
    /// Requires an open write transaction on `store`.
    fn store_update_schema(
        &self,
        store: RawHandle,
        schema: RawHandle,
        version: SchemaVersion,
    ) -> Result<()>;
    fn store_begin_transaction(&self, store: RawHandle) -> Result<()>;
    fn store_commit_transaction(&self, store: RawHandle) -> Result<()>;
    fn store_cancel_transaction(&self, store: RawHandle) -> Result<()>;
    fn store_is_in_transaction(&self, store: RawHandle) -> Result<bool>;
    fn store_get_table(&self, store: RawHandle, object_type: &str) -> Result<Option<RawHandle>>;
    /// Removes the backing storage of a closed store.
    fn store_delete_files(&self, config: &NativeConfig) -> Result<()>;

    // ------------------------------------------------------------------
    // schema
    // ------------------------------------------------------------------

    fn schema_create(&self, schema: &Schema) -> Result<RawHandle>;
    fn schema_clone(&self, schema: RawHandle) -> Result<RawHandle>;
    fn schema_get(&self, schema: RawHandle) -> Result<Schema>;
    fn schema_destroy(&self, schema: RawHandle);

    // ------------------------------------------------------------------
    // table
    // ------------------------------------------------------------------

    fn table_get_column_index(&self, table: RawHandle, name: &str) -> Result<Option<usize>>;
    fn table_add_empty_row(&self, table: RawHandle) -> Result<RawHandle>;
    fn table_size(&self, table: RawHandle) -> Result<usize>;
    fn table_get_row(&self, table: RawHandle, row_index: usize) -> Result<RawHandle>;
    fn table_find_first_int(
        &self,
        table: RawHandle,
        column: usize,
        value: i64,
    ) -> Result<Option<RawHandle>>;
    fn table_find_first_string(
        &self,
        table: RawHandle,
        column: usize,
        value: &[u16],
    ) -> Result<Option<RawHandle>>;
    fn table_destroy(&self, table: RawHandle);

    // ------------------------------------------------------------------
    // row
    // ------------------------------------------------------------------

    fn row_get_row_index(&self, row: RawHandle) -> Result<usize>;
    fn row_get_is_attached(&self, row: RawHandle) -> Result<bool>;
    /// Identity of the table the row lives in, unique per store file.
    fn row_get_table_key(&self, row: RawHandle) -> Result<u64>;
    fn row_clone(&self, row: RawHandle) -> Result<RawHandle>;
    fn row_remove(&self, row: RawHandle) -> Result<()>;
    fn row_destroy(&self, row: RawHandle);

    // ------------------------------------------------------------------
    // object scalars
    // ------------------------------------------------------------------

    fn object_get_int64(&self, row: RawHandle, column: usize) -> Result<i64>;
    fn object_get_nullable_int64(&self, row: RawHandle, column: usize) -> Result<Option<i64>>;
    fn object_set_int64(&self, row: RawHandle, column: usize, value: i64) -> Result<()>;
    fn object_set_int64_unique(&self, row: RawHandle, column: usize, value: i64) -> Result<()>;

    fn object_get_bool(&self, row: RawHandle, column: usize) -> Result<bool>;
    fn object_get_nullable_bool(&self, row: RawHandle, column: usize) -> Result<Option<bool>>;
    fn object_set_bool(&self, row: RawHandle, column: usize, value: bool) -> Result<()>;

    fn object_get_float(&self, row: RawHandle, column: usize) -> Result<f32>;
    fn object_get_nullable_float(&self, row: RawHandle, column: usize) -> Result<Option<f32>>;
    fn object_set_float(&self, row: RawHandle, column: usize, value: f32) -> Result<()>;

    fn object_get_double(&self, row: RawHandle, column: usize) -> Result<f64>;
    fn object_get_nullable_double(&self, row: RawHandle, column: usize) -> Result<Option<f64>>;
    fn object_set_double(&self, row: RawHandle, column: usize, value: f64) -> Result<()>;

    fn object_get_timestamp_milliseconds(&self, row: RawHandle, column: usize) -> Result<i64>;
    fn object_get_nullable_timestamp_milliseconds(
        &self,
        row: RawHandle,
        column: usize,
    ) -> Result<Option<i64>>;
    fn object_set_timestamp_milliseconds(
        &self,
        row: RawHandle,
        column: usize,
        value: i64,
    ) -> Result<()>;

    fn object_set_null(&self, row: RawHandle, column: usize) -> Result<()>;

    // ------------------------------------------------------------------
    // strings and binary
    // ------------------------------------------------------------------

    /// Transcodes the stored value into `buffer` as UTF-16.
    fn object_get_string(
        &self,
        row: RawHandle,
        column: usize,
        buffer: &mut [u16],
    ) -> Result<StringRead>;
    fn object_set_string(&self, row: RawHandle, column: usize, value: &[u16]) -> Result<()>;
    fn object_set_string_unique(&self, row: RawHandle, column: usize, value: &[u16])
    -> Result<()>;

    /// `None` is a null payload; `Some(vec![])` is present but empty.
    fn object_get_binary(&self, row: RawHandle, column: usize) -> Result<Option<Vec<u8>>>;
    fn object_set_binary(&self, row: RawHandle, column: usize, value: &[u8]) -> Result<()>;

    // ------------------------------------------------------------------
    // relations
    // ------------------------------------------------------------------

    /// Returns a new row handle for the linked row, or `None` when unset.
    fn object_get_link(&self, row: RawHandle, column: usize) -> Result<Option<RawHandle>>;
    fn object_set_link(&self, row: RawHandle, column: usize, target_row_index: usize)
    -> Result<()>;
    fn object_clear_link(&self, row: RawHandle, column: usize) -> Result<()>;
    fn object_get_linklist(&self, row: RawHandle, column: usize) -> Result<RawHandle>;

    fn list_size(&self, list: RawHandle) -> Result<usize>;
    fn list_get(&self, list: RawHandle, index: usize) -> Result<RawHandle>;
    fn list_add(&self, list: RawHandle, target_row_index: usize) -> Result<()>;
    fn list_insert(&self, list: RawHandle, index: usize, target_row_index: usize) -> Result<()>;
    fn list_erase(&self, list: RawHandle, index: usize) -> Result<()>;
    fn list_clear(&self, list: RawHandle) -> Result<()>;
    fn list_destroy(&self, list: RawHandle);
}
