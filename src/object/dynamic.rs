use super::{Binding, PropertyValue};
use crate::core::{Result, Value};
use crate::store::ObjectMetadata;
use std::sync::Arc;

/// A managed object addressed by property name rather than by a model type.
///
/// Migration callbacks see the old side of the store through these.
#[derive(Debug)]
pub struct DynamicObject {
    binding: Binding,
}

impl DynamicObject {
    pub(crate) fn new(binding: Binding) -> Self {
        Self { binding }
    }

    pub fn object_type(&self) -> &str {
        self.binding.metadata().object_type()
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn is_valid(&self) -> bool {
        self.binding.row().is_attached()
    }

    pub fn get<T: PropertyValue>(&self, property: &str) -> Result<T> {
        T::read(&self.binding, property)
    }

    pub fn set<T: PropertyValue>(&self, property: &str, value: T) -> Result<()> {
        value.write(&self.binding, property)
    }

    /// Reads a property according to its stored type.
    pub fn get_value(&self, property: &str) -> Result<Value> {
        self.binding.get_value(property)
    }

    pub fn set_value(&self, property: &str, value: &Value) -> Result<()> {
        let declared = self
            .binding
            .metadata()
            .object_schema()
            .property(property)
            .cloned()
            .ok_or_else(|| crate::core::BindError::MissingColumn {
                object_type: self.object_type().to_string(),
                property: property.to_string(),
            })?;
        self.binding.set_value(&declared, value)
    }

    pub fn get_link(&self, property: &str) -> Result<Option<DynamicObject>> {
        Ok(self.binding.get_link(property)?.map(DynamicObject::new))
    }

    pub fn get_list(&self, property: &str) -> Result<Vec<DynamicObject>> {
        let (list, metadata) = self.binding.get_list(property)?;
        let store = self.binding.store()?;
        (0..list.size()?)
            .map(|index| {
                let row = list.get(index)?;
                Ok(DynamicObject::new(Binding::new(
                    &store,
                    row,
                    Arc::clone(&metadata),
                )))
            })
            .collect()
    }

    pub fn metadata(&self) -> &ObjectMetadata {
        self.binding.metadata()
    }
}

impl PartialEq for DynamicObject {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.binding == other.binding
    }
}
