pub mod accessors;
pub mod binding;
pub mod dynamic;
pub mod list;
pub mod property;

pub use binding::Binding;
pub use dynamic::DynamicObject;
pub use list::ObjectList;
pub use property::PropertyValue;

use crate::core::{BindError, ObjectSchema, Result, Value};
use crate::store::Store;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// A persistent object type.
///
/// Usually implemented through [`store_object!`](crate::store_object).
pub trait Model: Sized + Send + 'static {
    const TYPE_NAME: &'static str;

    /// Property manifest of this type.
    fn object_schema() -> ObjectSchema;

    fn core(&self) -> &ObjectCore;
    fn core_mut(&mut self) -> &mut ObjectCore;
    fn from_core(core: ObjectCore) -> Self;

    fn new_standalone() -> Self {
        Self::from_core(ObjectCore::standalone(&Self::object_schema()))
    }

    fn is_managed(&self) -> bool {
        self.core().is_managed()
    }

    /// Standalone objects are always valid; managed ones until their row
    /// is removed.
    fn is_valid(&self) -> bool {
        match self.core() {
            ObjectCore::Standalone(_) => true,
            ObjectCore::Managed(binding) => binding.row().is_attached(),
        }
    }

    fn row_index(&self) -> Result<usize> {
        self.core().binding()?.row().row_index()
    }

    fn store(&self) -> Option<Store> {
        match self.core() {
            ObjectCore::Standalone(_) => None,
            ObjectCore::Managed(binding) => binding.store().ok(),
        }
    }

    /// Same reference, or both managed and bound to the same row.
    fn same_object(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match (self.core(), other.core()) {
            (ObjectCore::Managed(lhs), ObjectCore::Managed(rhs)) => lhs == rhs,
            _ => false,
        }
    }

    /// Managed objects clone their row reference; standalone objects copy
    /// their fields.
    fn try_clone(&self) -> Result<Self> {
        Ok(Self::from_core(self.core().try_clone()?))
    }
}

/// A related object held by a standalone object.
trait StandaloneLink: Send {
    fn clone_link(&self) -> Result<Box<dyn StandaloneLink>>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Model> StandaloneLink for T {
    fn clone_link(&self) -> Result<Box<dyn StandaloneLink>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Field storage of an object that is not bound to a store.
pub struct StandaloneFields {
    values: HashMap<String, Value>,
    links: HashMap<String, Box<dyn StandaloneLink>>,
}

impl StandaloneFields {
    pub fn from_schema(schema: &ObjectSchema) -> Self {
        let values = schema
            .properties
            .iter()
            .filter(|p| !p.property_type.is_relation())
            .map(|p| (p.name.clone(), p.default_value()))
            .collect();
        Self {
            values,
            links: HashMap::new(),
        }
    }

    pub fn value(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    fn get<T: PropertyValue>(&self, property: &str) -> Result<T> {
        let value = self.values.get(property).ok_or_else(|| {
            BindError::SchemaMismatch(format!("no property '{}' on this object", property))
        })?;
        T::from_value(value)
    }

    fn set<T: PropertyValue>(&mut self, property: &str, value: T) -> Result<()> {
        let slot = self.values.get_mut(property).ok_or_else(|| {
            BindError::SchemaMismatch(format!("no property '{}' on this object", property))
        })?;
        *slot = value.into_value();
        Ok(())
    }

    fn try_clone(&self) -> Result<Self> {
        let links = self
            .links
            .iter()
            .map(|(name, link)| Ok((name.clone(), link.clone_link()?)))
            .collect::<Result<_>>()?;
        Ok(Self {
            values: self.values.clone(),
            links,
        })
    }
}

/// State behind every model object: local fields, or a binding to a row.
pub enum ObjectCore {
    Standalone(StandaloneFields),
    Managed(Binding),
}

impl ObjectCore {
    pub fn standalone(schema: &ObjectSchema) -> Self {
        Self::Standalone(StandaloneFields::from_schema(schema))
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed(_))
    }

    pub fn binding(&self) -> Result<&Binding> {
        match self {
            Self::Managed(binding) => Ok(binding),
            Self::Standalone(_) => Err(BindError::NotManaged),
        }
    }

    pub fn get<T: PropertyValue>(&self, property: &str) -> Result<T> {
        match self {
            Self::Standalone(fields) => fields.get(property),
            Self::Managed(binding) => T::read(binding, property),
        }
    }

    pub fn set<T: PropertyValue>(&mut self, property: &str, value: T) -> Result<()> {
        match self {
            Self::Standalone(fields) => fields.set(property, value),
            Self::Managed(binding) => value.write(binding, property),
        }
    }

    /// Setter for identifier properties. Uniqueness is only enforced once
    /// the object is managed.
    pub fn set_unique<T: PropertyValue>(&mut self, property: &str, value: T) -> Result<()> {
        match self {
            Self::Standalone(fields) => fields.set(property, value),
            Self::Managed(binding) => value.write_unique(binding, property),
        }
    }

    pub fn get_link<T: Model>(&self, property: &str) -> Result<Option<T>> {
        match self {
            Self::Standalone(fields) => match fields.links.get(property) {
                None => Ok(None),
                Some(link) => {
                    let target = link.as_any().downcast_ref::<T>().ok_or_else(|| {
                        BindError::TypeMismatch(format!(
                            "'{}' does not hold a {}",
                            property,
                            T::TYPE_NAME
                        ))
                    })?;
                    target.try_clone().map(Some)
                }
            },
            Self::Managed(binding) => match binding.get_link(property)? {
                None => Ok(None),
                Some(target) if target.metadata().object_type() == T::TYPE_NAME => {
                    Ok(Some(T::from_core(Self::Managed(target))))
                }
                Some(target) => Err(BindError::TypeMismatch(format!(
                    "'{}' links to {}, not {}",
                    property,
                    target.metadata().object_type(),
                    T::TYPE_NAME
                ))),
            },
        }
    }

    /// Sets a to-one relation. On a managed object a standalone target is
    /// managed into the same store first; a standalone object keeps a copy.
    pub fn set_link<T: Model>(&mut self, property: &str, value: Option<&mut T>) -> Result<()> {
        match self {
            Self::Standalone(fields) => {
                match value {
                    Some(target) => {
                        fields
                            .links
                            .insert(property.to_string(), Box::new(target.try_clone()?));
                    }
                    None => {
                        fields.links.remove(property);
                    }
                }
                Ok(())
            }
            Self::Managed(binding) => {
                let Some(target) = value else {
                    return binding.clear_link(property);
                };
                let store = binding.guard_write()?;
                let expected = binding.metadata().relation_target(property)?;
                if expected != T::TYPE_NAME {
                    return Err(BindError::TypeMismatch(format!(
                        "'{}' expects {}, got {}",
                        property,
                        expected,
                        T::TYPE_NAME
                    )));
                }
                if !target.is_managed() {
                    store.manage(target)?;
                }
                binding.set_link(property, target.core().binding()?)
            }
        }
    }

    pub fn get_list<T: Model>(&self, property: &str) -> Result<ObjectList<T>> {
        let binding = self.binding()?;
        let (list, metadata) = binding.get_list(property)?;
        ObjectList::new(binding.store()?, list, metadata)
    }

    pub fn try_clone(&self) -> Result<Self> {
        match self {
            Self::Standalone(fields) => Ok(Self::Standalone(fields.try_clone()?)),
            Self::Managed(binding) => Ok(Self::Managed(binding.try_clone()?)),
        }
    }
}

impl fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone(fields) => {
                let mut names: Vec<&String> = fields.values.keys().collect();
                names.sort();
                let mut map = f.debug_map();
                for name in names {
                    map.entry(name, &fields.values[name]);
                }
                map.finish()
            }
            Self::Managed(binding) => f
                .debug_struct("Managed")
                .field("object_type", &binding.metadata().object_type())
                .field("row", binding.row())
                .finish(),
        }
    }
}
