use super::{BindError, Result, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical type of a declared property.
///
/// All integer widths share `Int`; narrowing happens in the accessor layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Int,
    Bool,
    Float,
    Double,
    String,
    Data,
    Date,
    Object,
    List,
}

impl PropertyType {
    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Object | Self::List)
    }

    /// Value a freshly created standalone object holds for this type.
    pub fn default_value(&self, nullable: bool) -> Value {
        if nullable {
            return Value::Null;
        }
        match self {
            Self::Int => Value::Int(0),
            Self::Bool => Value::Bool(false),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::String => Value::String(String::new()),
            Self::Data => Value::Data(Vec::new()),
            Self::Date => Value::Date(crate::core::value::unix_epoch()),
            Self::Object | Self::List => Value::Null,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
            Self::Data => write!(f, "data"),
            Self::Date => write!(f, "date"),
            Self::Object => write!(f, "object"),
            Self::List => write!(f, "list"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
    /// Target type name for `Object` and `List` properties.
    pub object_type: Option<String>,
    pub nullable: bool,
    pub primary: bool,
    pub indexed: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            object_type: None,
            nullable: false,
            primary: false,
            indexed: false,
        }
    }

    /// Single relation to another object type. Links are always nullable.
    pub fn link(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            object_type: Some(target.into()),
            nullable: true,
            ..Self::new(name, PropertyType::Object)
        }
    }

    pub fn list(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            object_type: Some(target.into()),
            ..Self::new(name, PropertyType::List)
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Primary keys are implicitly indexed.
    pub fn primary_key(mut self, primary: bool) -> Self {
        self.primary = primary;
        if primary {
            self.indexed = true;
        }
        self
    }

    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    pub fn default_value(&self) -> Value {
        self.property_type.default_value(self.nullable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub name: String,
    pub properties: Vec<Property>,
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn primary_key(&self) -> Option<&Property> {
        self.properties.iter().find(|p| p.primary)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for property in &self.properties {
            if !seen.insert(property.name.as_str()) {
                return Err(BindError::SchemaMismatch(format!(
                    "Duplicate property '{}' in '{}'",
                    property.name, self.name
                )));
            }
            if property.property_type.is_relation() && property.object_type.is_none() {
                return Err(BindError::SchemaMismatch(format!(
                    "Relation '{}.{}' has no target type",
                    self.name, property.name
                )));
            }
        }
        if self.properties.iter().filter(|p| p.primary).count() > 1 {
            return Err(BindError::SchemaMismatch(format!(
                "'{}' declares more than one primary key",
                self.name
            )));
        }
        Ok(())
    }

    fn is_equivalent(&self, other: &ObjectSchema) -> bool {
        if self.name != other.name || self.properties.len() != other.properties.len() {
            return false;
        }
        self.properties
            .iter()
            .all(|p| other.property(&p.name).is_some_and(|o| o == p))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    objects: Vec<ObjectSchema>,
}

impl Schema {
    pub fn new(objects: Vec<ObjectSchema>) -> Self {
        Self { objects }
    }

    pub fn objects(&self) -> &[ObjectSchema] {
        &self.objects
    }

    pub fn find(&self, name: &str) -> Option<&ObjectSchema> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Adds or replaces the schema for one object type.
    pub fn upsert(&mut self, object: ObjectSchema) {
        match self.objects.iter_mut().find(|o| o.name == object.name) {
            Some(existing) => *existing = object,
            None => self.objects.push(object),
        }
    }

    /// Checks relation targets and per-object invariants.
    pub fn validate(&self) -> Result<()> {
        for object in &self.objects {
            object.validate()?;
            for property in &object.properties {
                if let Some(target) = &property.object_type
                    && self.find(target).is_none()
                {
                    return Err(BindError::SchemaMismatch(format!(
                        "'{}.{}' links to '{}' which is not part of the schema",
                        object.name, property.name, target
                    )));
                }
            }
        }
        Ok(())
    }

    /// Same object types and properties, ignoring declaration order.
    pub fn is_equivalent(&self, other: &Schema) -> bool {
        self.objects.len() == other.objects.len()
            && self
                .objects
                .iter()
                .all(|o| other.find(&o.name).is_some_and(|other| o.is_equivalent(other)))
    }
}

/// Store-scoped schema version counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u64);

impl SchemaVersion {
    /// No schema version has ever been committed.
    pub const UNVERSIONED: SchemaVersion = SchemaVersion(u64::MAX);

    pub fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn is_versioned(&self) -> bool {
        *self != Self::UNVERSIONED
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::UNVERSIONED
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_versioned() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "unversioned")
        }
    }
}
