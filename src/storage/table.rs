use crate::core::{BindError, ObjectSchema, Property, PropertyType, Result, Schema, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cell as the engine stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NativeValue {
    Null,
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    /// UTF-8 bytes; decoded lazily so damaged data surfaces on read.
    String(Vec<u8>),
    Binary(Vec<u8>),
    Timestamp(i64),
    Link(Option<u64>),
    LinkList(Vec<u64>),
}

impl NativeValue {
    pub fn default_for(property: &Property) -> Self {
        match property.property_type {
            PropertyType::Object => Self::Link(None),
            PropertyType::List => Self::LinkList(Vec::new()),
            _ if property.nullable => Self::Null,
            PropertyType::Int => Self::Int(0),
            PropertyType::Bool => Self::Bool(false),
            PropertyType::Float => Self::Float(0.0),
            PropertyType::Double => Self::Double(0.0),
            PropertyType::String => Self::String(Vec::new()),
            PropertyType::Data => Self::Binary(Vec::new()),
            PropertyType::Date => Self::Timestamp(0),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Link(None))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRow {
    pub key: u64,
    pub values: Vec<NativeValue>,
}

/// Rows of one object type. Row keys are stable; row indices are positions
/// and shift when rows are removed (move-last-over).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableData {
    pub table_key: u64,
    pub columns: Vec<Property>,
    pub rows: Vec<StoredRow>,
    next_row_key: u64,
}

impl TableData {
    pub fn new(table_key: u64, object: &ObjectSchema) -> Self {
        Self {
            table_key,
            columns: object.properties.clone(),
            rows: Vec::new(),
            next_row_key: 1,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, column: usize) -> Result<&Property> {
        self.columns
            .get(column)
            .ok_or_else(|| BindError::Native(format!("Column index {} out of range", column)))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn add_empty_row(&mut self) -> u64 {
        let key = self.next_row_key;
        self.next_row_key += 1;
        let values = self.columns.iter().map(NativeValue::default_for).collect();
        self.rows.push(StoredRow { key, values });
        key
    }

    pub fn position(&self, key: u64) -> Option<usize> {
        self.rows.iter().position(|r| r.key == key)
    }

    pub fn key_at(&self, row_index: usize) -> Result<u64> {
        self.rows
            .get(row_index)
            .map(|r| r.key)
            .ok_or_else(|| BindError::Native(format!("Row index {} out of range", row_index)))
    }

    pub fn cell(&self, key: u64, column: usize) -> Result<&NativeValue> {
        let position = self.position(key).ok_or_else(detached)?;
        self.rows[position]
            .values
            .get(column)
            .ok_or_else(|| BindError::Native(format!("Column index {} out of range", column)))
    }

    pub fn cell_mut(&mut self, key: u64, column: usize) -> Result<&mut NativeValue> {
        let position = self.position(key).ok_or_else(detached)?;
        self.rows[position]
            .values
            .get_mut(column)
            .ok_or_else(|| BindError::Native(format!("Column index {} out of range", column)))
    }

    /// Writes `value` after checking no other live row holds it.
    pub fn set_unique(&mut self, key: u64, column: usize, value: NativeValue) -> Result<()> {
        let conflict = self
            .rows
            .iter()
            .any(|r| r.key != key && r.values.get(column) == Some(&value));
        if conflict {
            return Err(BindError::ConstraintViolation(format!(
                "Column '{}' already contains this value",
                self.column(column)?.name
            )));
        }
        *self.cell_mut(key, column)? = value;
        Ok(())
    }

    pub fn find_first(&self, column: usize, value: &NativeValue) -> Option<u64> {
        self.rows
            .iter()
            .find(|r| r.values.get(column) == Some(value))
            .map(|r| r.key)
    }

    /// Removes a row by moving the last row into its slot.
    pub fn remove(&mut self, key: u64) -> Result<()> {
        let position = self.position(key).ok_or_else(detached)?;
        self.rows.swap_remove(position);
        Ok(())
    }

    /// Clears links and list entries in this table that point at `target`.
    pub fn nullify_links_to(&mut self, target_type: &str, target: u64) {
        let columns: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.object_type.as_deref() == Some(target_type))
            .map(|(i, _)| i)
            .collect();
        for row in &mut self.rows {
            for &column in &columns {
                match &mut row.values[column] {
                    NativeValue::Link(link) if *link == Some(target) => *link = None,
                    NativeValue::LinkList(keys) => keys.retain(|k| *k != target),
                    _ => {}
                }
            }
        }
    }

    /// Rebuilds the column set for `object`, keeping values of columns whose
    /// name and type are unchanged and defaulting the rest.
    fn reshape(&mut self, object: &ObjectSchema) {
        let mapping: Vec<Option<usize>> = object
            .properties
            .iter()
            .map(|p| {
                self.column_index(&p.name).filter(|&i| {
                    let old = &self.columns[i];
                    old.property_type == p.property_type && old.object_type == p.object_type
                })
            })
            .collect();

        for row in &mut self.rows {
            let values = object
                .properties
                .iter()
                .zip(&mapping)
                .map(|(property, source)| match source {
                    Some(i) => {
                        let old = row.values[*i].clone();
                        if old.is_null() && !property.nullable {
                            NativeValue::default_for(property)
                        } else {
                            old
                        }
                    }
                    None => NativeValue::default_for(property),
                })
                .collect();
            row.values = values;
        }
        self.columns = object.properties.clone();
    }
}

fn detached() -> BindError {
    BindError::Native("Row is no longer attached".to_string())
}

/// Full content of one store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub schema_version: SchemaVersion,
    pub schema: Schema,
    pub tables: BTreeMap<String, TableData>,
    pub key_fingerprint: Option<u64>,
    next_table_key: u64,
}

impl Database {
    pub fn new() -> Self {
        Self {
            schema_version: SchemaVersion::UNVERSIONED,
            schema: Schema::default(),
            tables: BTreeMap::new(),
            key_fingerprint: None,
            next_table_key: 1,
        }
    }

    pub fn table(&self, name: &str) -> Result<&TableData> {
        self.tables
            .get(name)
            .ok_or_else(|| BindError::UnknownObjectType(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut TableData> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| BindError::UnknownObjectType(name.to_string()))
    }

    /// Brings tables in line with `schema`. Tables for types no longer
    /// declared are dropped.
    pub fn apply_schema(&mut self, schema: &Schema, version: SchemaVersion) {
        self.tables
            .retain(|name, _| schema.find(name).is_some());
        for object in schema.objects() {
            match self.tables.get_mut(&object.name) {
                Some(table) => table.reshape(object),
                None => {
                    let key = self.next_table_key;
                    self.next_table_key += 1;
                    self.tables
                        .insert(object.name.clone(), TableData::new(key, object));
                }
            }
        }
        self.schema = schema.clone();
        self.schema_version = version;
    }

    /// Removes a row and every link pointing at it.
    pub fn remove_row(&mut self, table: &str, key: u64) -> Result<()> {
        self.table_mut(table)?.remove(key)?;
        for data in self.tables.values_mut() {
            data.nullify_links_to(table, key);
        }
        Ok(())
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(extra: bool) -> Schema {
        let mut object = ObjectSchema::new("Person")
            .with_property(Property::new("name", PropertyType::String))
            .with_property(Property::new("age", PropertyType::Int));
        if extra {
            object = object.with_property(Property::new("nick", PropertyType::String).nullable(true));
        }
        Schema::new(vec![object])
    }

    #[test]
    fn test_row_index_shifts_on_remove() {
        let mut db = Database::new();
        db.apply_schema(&person(false), SchemaVersion::new(1));
        let table = db.table_mut("Person").unwrap();
        let a = table.add_empty_row();
        let _b = table.add_empty_row();
        let c = table.add_empty_row();
        assert_eq!(table.position(c), Some(2));

        db.remove_row("Person", a).unwrap();
        let table = db.table("Person").unwrap();
        assert_eq!(table.position(c), Some(0));
        assert_eq!(table.position(a), None);
    }

    #[test]
    fn test_reshape_keeps_existing_values() {
        let mut db = Database::new();
        db.apply_schema(&person(false), SchemaVersion::new(1));
        let table = db.table_mut("Person").unwrap();
        let key = table.add_empty_row();
        *table.cell_mut(key, 1).unwrap() = NativeValue::Int(42);

        db.apply_schema(&person(true), SchemaVersion::new(2));
        let table = db.table("Person").unwrap();
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.cell(key, 1).unwrap(), &NativeValue::Int(42));
        assert_eq!(table.cell(key, 2).unwrap(), &NativeValue::Null);
        assert_eq!(db.schema_version, SchemaVersion::new(2));
    }

    #[test]
    fn test_set_unique_rejects_duplicates() {
        let mut db = Database::new();
        db.apply_schema(&person(false), SchemaVersion::new(1));
        let table = db.table_mut("Person").unwrap();
        let a = table.add_empty_row();
        let b = table.add_empty_row();
        table.set_unique(a, 1, NativeValue::Int(7)).unwrap();
        assert!(table.set_unique(b, 1, NativeValue::Int(7)).is_err());
        table.set_unique(a, 1, NativeValue::Int(7)).unwrap();
    }
}
