//! Typed get/set surface of a managed object.
//!
//! Each accessor resolves the property's column from the type metadata and
//! makes one engine call. Setters check the transaction guard first, so a
//! rejected write never reaches the engine.

use super::binding::Binding;
use crate::core::{
    BindError, Property, PropertyType, Result, Value, from_unix_millis, to_unix_millis,
};
use crate::handles::{ListHandle, RowHandle};
use crate::store::ObjectMetadata;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

impl Binding {
    // ------------------------------------------------------------------
    // integers
    // ------------------------------------------------------------------

    pub fn get_int64(&self, property: &str) -> Result<i64> {
        self.engine()
            .object_get_int64(self.raw()?, self.column(property)?)
    }

    pub fn get_nullable_int64(&self, property: &str) -> Result<Option<i64>> {
        self.engine()
            .object_get_nullable_int64(self.raw()?, self.column(property)?)
    }

    pub fn set_int64(&self, property: &str, value: i64) -> Result<()> {
        self.guard_write()?;
        self.engine()
            .object_set_int64(self.raw()?, self.column(property)?, value)
    }

    pub fn set_nullable_int64(&self, property: &str, value: Option<i64>) -> Result<()> {
        match value {
            Some(v) => self.set_int64(property, v),
            None => self.set_null(property),
        }
    }

    /// Sets an identifier; the engine rejects a value another row holds.
    pub fn set_int64_unique(&self, property: &str, value: i64) -> Result<()> {
        self.guard_write()?;
        self.engine()
            .object_set_int64_unique(self.raw()?, self.column(property)?, value)
    }

    // ------------------------------------------------------------------
    // bool, float, double
    // ------------------------------------------------------------------

    pub fn get_bool(&self, property: &str) -> Result<bool> {
        self.engine()
            .object_get_bool(self.raw()?, self.column(property)?)
    }

    pub fn get_nullable_bool(&self, property: &str) -> Result<Option<bool>> {
        self.engine()
            .object_get_nullable_bool(self.raw()?, self.column(property)?)
    }

    pub fn set_bool(&self, property: &str, value: bool) -> Result<()> {
        self.guard_write()?;
        self.engine()
            .object_set_bool(self.raw()?, self.column(property)?, value)
    }

    pub fn set_nullable_bool(&self, property: &str, value: Option<bool>) -> Result<()> {
        match value {
            Some(v) => self.set_bool(property, v),
            None => self.set_null(property),
        }
    }

    pub fn get_float(&self, property: &str) -> Result<f32> {
        self.engine()
            .object_get_float(self.raw()?, self.column(property)?)
    }

    pub fn get_nullable_float(&self, property: &str) -> Result<Option<f32>> {
        self.engine()
            .object_get_nullable_float(self.raw()?, self.column(property)?)
    }

    pub fn set_float(&self, property: &str, value: f32) -> Result<()> {
        self.guard_write()?;
        self.engine()
            .object_set_float(self.raw()?, self.column(property)?, value)
    }

    pub fn set_nullable_float(&self, property: &str, value: Option<f32>) -> Result<()> {
        match value {
            Some(v) => self.set_float(property, v),
            None => self.set_null(property),
        }
    }

    pub fn get_double(&self, property: &str) -> Result<f64> {
        self.engine()
            .object_get_double(self.raw()?, self.column(property)?)
    }

    pub fn get_nullable_double(&self, property: &str) -> Result<Option<f64>> {
        self.engine()
            .object_get_nullable_double(self.raw()?, self.column(property)?)
    }

    pub fn set_double(&self, property: &str, value: f64) -> Result<()> {
        self.guard_write()?;
        self.engine()
            .object_set_double(self.raw()?, self.column(property)?, value)
    }

    pub fn set_nullable_double(&self, property: &str, value: Option<f64>) -> Result<()> {
        match value {
            Some(v) => self.set_double(property, v),
            None => self.set_null(property),
        }
    }

    // ------------------------------------------------------------------
    // timestamps
    // ------------------------------------------------------------------

    pub fn get_date(&self, property: &str) -> Result<DateTime<FixedOffset>> {
        let millis = self
            .engine()
            .object_get_timestamp_milliseconds(self.raw()?, self.column(property)?)?;
        timestamp(property, millis)
    }

    pub fn get_nullable_date(&self, property: &str) -> Result<Option<DateTime<FixedOffset>>> {
        self.engine()
            .object_get_nullable_timestamp_milliseconds(self.raw()?, self.column(property)?)?
            .map(|millis| timestamp(property, millis))
            .transpose()
    }

    pub fn set_date(&self, property: &str, value: &DateTime<FixedOffset>) -> Result<()> {
        self.guard_write()?;
        self.engine().object_set_timestamp_milliseconds(
            self.raw()?,
            self.column(property)?,
            to_unix_millis(value),
        )
    }

    pub fn set_nullable_date(
        &self,
        property: &str,
        value: Option<&DateTime<FixedOffset>>,
    ) -> Result<()> {
        match value {
            Some(v) => self.set_date(property, v),
            None => self.set_null(property),
        }
    }

    // ------------------------------------------------------------------
    // strings and binary
    // ------------------------------------------------------------------

    /// `Ok(None)` is a null string; `Ok(Some(""))` is present but empty.
    pub fn get_string(&self, property: &str) -> Result<Option<String>> {
        self.store()?
            .read_string(self.raw()?, self.column(property)?, property)
    }

    pub fn set_string(&self, property: &str, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return self.set_null(property);
        };
        self.guard_write()?;
        let units: Vec<u16> = value.encode_utf16().collect();
        self.engine()
            .object_set_string(self.raw()?, self.column(property)?, &units)
    }

    /// Identifier strings cannot be null.
    pub fn set_string_unique(&self, property: &str, value: Option<&str>) -> Result<()> {
        self.guard_write()?;
        let value = value.ok_or(BindError::NullIdentifier)?;
        let units: Vec<u16> = value.encode_utf16().collect();
        self.engine()
            .object_set_string_unique(self.raw()?, self.column(property)?, &units)
    }

    /// `Ok(None)` is a null payload; `Ok(Some(vec![]))` is present but empty.
    pub fn get_binary(&self, property: &str) -> Result<Option<Vec<u8>>> {
        self.engine()
            .object_get_binary(self.raw()?, self.column(property)?)
    }

    pub fn set_binary(&self, property: &str, value: Option<&[u8]>) -> Result<()> {
        let Some(value) = value else {
            return self.set_null(property);
        };
        self.guard_write()?;
        self.engine()
            .object_set_binary(self.raw()?, self.column(property)?, value)
    }

    pub fn set_null(&self, property: &str) -> Result<()> {
        self.guard_write()?;
        self.engine()
            .object_set_null(self.raw()?, self.column(property)?)
    }

    // ------------------------------------------------------------------
    // relations
    // ------------------------------------------------------------------

    /// The linked object, or `None` when the link is unset.
    pub fn get_link(&self, property: &str) -> Result<Option<Binding>> {
        let target = self.target_metadata(property)?;
        let linked = self
            .engine()
            .object_get_link(self.raw()?, self.column(property)?)?;
        let Some(raw) = linked else {
            return Ok(None);
        };
        let row = RowHandle::bind(Arc::clone(self.engine()), raw);
        Ok(Some(Binding::new(&self.store()?, row, target)))
    }

    /// Links to `target`, which must be managed by the same store.
    pub fn set_link(&self, property: &str, target: &Binding) -> Result<()> {
        self.guard_write()?;
        if !self.shares_store(target) {
            return Err(BindError::AlreadyManaged);
        }
        let expected = self.metadata().relation_target(property)?;
        if target.metadata().object_type() != expected {
            return Err(BindError::TypeMismatch(format!(
                "'{}' expects {}, got {}",
                property,
                expected,
                target.metadata().object_type()
            )));
        }
        let target_row = target.row().row_index()?;
        self.engine()
            .object_set_link(self.raw()?, self.column(property)?, target_row)
    }

    pub fn clear_link(&self, property: &str) -> Result<()> {
        self.guard_write()?;
        self.engine()
            .object_clear_link(self.raw()?, self.column(property)?)
    }

    /// The list behind a to-many property, with the metadata of its items.
    pub fn get_list(&self, property: &str) -> Result<(ListHandle, Arc<ObjectMetadata>)> {
        let target = self.target_metadata(property)?;
        let raw = self
            .engine()
            .object_get_linklist(self.raw()?, self.column(property)?)?;
        Ok((ListHandle::bind(Arc::clone(self.engine()), raw), target))
    }

    fn target_metadata(&self, property: &str) -> Result<Arc<ObjectMetadata>> {
        let target = self.metadata().relation_target(property)?;
        self.store()?.metadata(target)
    }

    // ------------------------------------------------------------------
    // untyped access
    // ------------------------------------------------------------------

    /// Writes a [`Value`] according to the property's declared type.
    /// Identifier properties go through the unique setters.
    pub fn set_value(&self, property: &Property, value: &Value) -> Result<()> {
        let name = property.name.as_str();
        match (property.property_type, value) {
            (_, Value::Null) if property.primary => {
                self.guard_write()?;
                Err(BindError::NullIdentifier)
            }
            (_, Value::Null) => self.set_null(name),
            (PropertyType::Int, Value::Int(v)) if property.primary => {
                self.set_int64_unique(name, *v)
            }
            (PropertyType::Int, Value::Int(v)) => self.set_int64(name, *v),
            (PropertyType::Bool, Value::Bool(v)) => self.set_bool(name, *v),
            (PropertyType::Float, Value::Float(v)) => self.set_float(name, *v),
            (PropertyType::Double, Value::Double(v)) => self.set_double(name, *v),
            (PropertyType::String, Value::String(v)) if property.primary => {
                self.set_string_unique(name, Some(v.as_str()))
            }
            (PropertyType::String, Value::String(v)) => self.set_string(name, Some(v.as_str())),
            (PropertyType::Data, Value::Data(v)) => self.set_binary(name, Some(v.as_slice())),
            (PropertyType::Date, Value::Date(v)) => self.set_date(name, v),
            (property_type, other) => Err(BindError::TypeMismatch(format!(
                "cannot store {} in {} property '{}'",
                other.type_name(),
                property_type,
                name
            ))),
        }
    }

    /// Reads a property as a [`Value`] according to its declared type.
    /// Relations read as `Null`.
    pub fn get_value(&self, property: &str) -> Result<Value> {
        let declared = self
            .metadata()
            .object_schema()
            .property(property)
            .ok_or_else(|| BindError::MissingColumn {
                object_type: self.metadata().object_type().to_string(),
                property: property.to_string(),
            })?;
        let value = match declared.property_type {
            PropertyType::Int => self.get_nullable_int64(property)?.map(Value::Int),
            PropertyType::Bool => self.get_nullable_bool(property)?.map(Value::Bool),
            PropertyType::Float => self.get_nullable_float(property)?.map(Value::Float),
            PropertyType::Double => self.get_nullable_double(property)?.map(Value::Double),
            PropertyType::String => self.get_string(property)?.map(Value::String),
            PropertyType::Data => self.get_binary(property)?.map(Value::Data),
            PropertyType::Date => self.get_nullable_date(property)?.map(Value::Date),
            PropertyType::Object | PropertyType::List => None,
        };
        Ok(value.unwrap_or(Value::Null))
    }
}

fn timestamp(property: &str, millis: i64) -> Result<DateTime<FixedOffset>> {
    from_unix_millis(millis).ok_or_else(|| {
        BindError::TypeMismatch(format!(
            "timestamp {} in '{}' is out of range",
            millis, property
        ))
    })
}
