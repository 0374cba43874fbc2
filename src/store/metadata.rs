use crate::core::{BindError, ObjectSchema, Result, Schema};
use crate::handles::{StoreHandle, TableHandle};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-type, per-store record of where each property lives.
#[derive(Debug)]
pub struct ObjectMetadata {
    pub(crate) table: TableHandle,
    pub(crate) column_indices: HashMap<String, usize>,
    pub(crate) object_schema: ObjectSchema,
    pub(crate) model_type: Option<TypeId>,
}

impl ObjectMetadata {
    /// Resolves every declared property to a column of the stored table.
    pub(crate) fn resolve(
        store: &StoreHandle,
        object_schema: &ObjectSchema,
        model_type: Option<TypeId>,
    ) -> Result<Self> {
        let table = store.table(&object_schema.name)?.ok_or_else(|| {
            BindError::SchemaMismatch(format!(
                "Object type '{}' has no table in the store",
                object_schema.name
            ))
        })?;

        let mut column_indices = HashMap::with_capacity(object_schema.properties.len());
        for property in &object_schema.properties {
            let index = table
                .column_index(&property.name)?
                .ok_or_else(|| BindError::MissingColumn {
                    object_type: object_schema.name.clone(),
                    property: property.name.clone(),
                })?;
            column_indices.insert(property.name.clone(), index);
        }

        Ok(Self {
            table,
            column_indices,
            object_schema: object_schema.clone(),
            model_type,
        })
    }

    pub fn object_type(&self) -> &str {
        &self.object_schema.name
    }

    pub fn object_schema(&self) -> &ObjectSchema {
        &self.object_schema
    }

    pub fn table(&self) -> &TableHandle {
        &self.table
    }

    pub fn column_index(&self, property: &str) -> Result<usize> {
        self.column_indices
            .get(property)
            .copied()
            .ok_or_else(|| BindError::MissingColumn {
                object_type: self.object_schema.name.clone(),
                property: property.to_string(),
            })
    }

    /// Target type of a relation property.
    pub fn relation_target(&self, property: &str) -> Result<&str> {
        self.object_schema
            .property(property)
            .and_then(|p| p.object_type.as_deref())
            .ok_or_else(|| {
                BindError::TypeMismatch(format!(
                    "'{}.{}' is not a relation",
                    self.object_schema.name, property
                ))
            })
    }
}

pub(crate) type MetadataRegistry = HashMap<String, Arc<ObjectMetadata>>;

/// Builds the registry for one store open.
pub(crate) fn build_registry(
    store: &StoreHandle,
    schema: &Schema,
    model_types: &HashMap<String, TypeId>,
) -> Result<MetadataRegistry> {
    schema
        .objects()
        .iter()
        .map(|object| {
            let model_type = model_types.get(&object.name).copied();
            let metadata = ObjectMetadata::resolve(store, object, model_type)?;
            Ok((object.name.clone(), Arc::new(metadata)))
        })
        .collect()
}
