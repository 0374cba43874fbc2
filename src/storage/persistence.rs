//! On-disk snapshots of store files for the reference engine

use crate::core::{BindError, Result};
use crate::storage::table::Database;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    format_version: u32,
    saved_at_unix_ms: u64,
    database: Database,
}

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Writes the whole database through a temp file in the same directory,
    /// then renames it over the target.
    pub fn save(&self, database: &Database) -> Result<()> {
        let parent = match self.snapshot_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .map_err(|e| BindError::IoError(format!("Failed to create store directory: {}", e)))?;

        let saved_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let file = StoreFile {
            format_version: FORMAT_VERSION,
            saved_at_unix_ms,
            database: database.clone(),
        };
        let serialized = rmp_serde::to_vec(&file)
            .map_err(|e| BindError::IoError(format!("Failed to serialize store: {}", e)))?;

        let temp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| BindError::IoError(format!("Failed to create temp file: {}", e)))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            writer
                .write_all(&serialized)
                .map_err(|e| BindError::IoError(format!("Failed to write store: {}", e)))?;
            writer
                .flush()
                .map_err(|e| BindError::IoError(format!("Failed to flush store: {}", e)))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| BindError::IoError(format!("Failed to sync store: {}", e)))?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| BindError::IoError(format!("Failed to replace store file: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<Database>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)
            .map_err(|e| BindError::IoError(format!("Failed to open store: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| BindError::IoError(format!("Failed to read store: {}", e)))?;
        let file: StoreFile = rmp_serde::from_slice(&data)
            .map_err(|e| BindError::Native(format!("Store file is malformed: {}", e)))?;
        if file.format_version != FORMAT_VERSION {
            return Err(BindError::Native(format!(
                "Unsupported store format version {}",
                file.format_version
            )));
        }
        Ok(Some(file.database))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }

    pub fn delete(&self) -> Result<()> {
        if self.snapshot_path.exists() {
            fs::remove_file(&self.snapshot_path)
                .map_err(|e| BindError::IoError(format!("Failed to delete store: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ObjectSchema, Property, PropertyType, Schema, SchemaVersion};
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path().join("test.store"));

        let mut database = Database::new();
        let schema = Schema::new(vec![
            ObjectSchema::new("Person").with_property(Property::new("name", PropertyType::String)),
        ]);
        database.apply_schema(&schema, SchemaVersion::new(3));
        database.table_mut("Person").unwrap().add_empty_row();

        manager.save(&database).unwrap();
        assert!(manager.exists());

        let loaded = manager.load().unwrap().unwrap();
        assert_eq!(loaded.schema_version, SchemaVersion::new(3));
        assert_eq!(loaded.table("Person").unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SnapshotManager::new(temp_dir.path().join("missing.store"));
        assert!(manager.load().unwrap().is_none());
        manager.delete().unwrap();
    }
}
