//! Mapping between Rust field types and the accessor layer.
//!
//! All integer widths are stored as `i64` and narrowed on read; a stored
//! value that does not fit the field type is a `TypeMismatch`.

use super::binding::Binding;
use crate::core::{BindError, PropertyType, Result, Value};
use chrono::{DateTime, FixedOffset};

pub trait PropertyValue: Sized {
    const PROPERTY_TYPE: PropertyType;
    const NULLABLE: bool = false;

    fn read(binding: &Binding, property: &str) -> Result<Self>;
    fn write(self, binding: &Binding, property: &str) -> Result<()>;

    fn write_unique(self, _binding: &Binding, property: &str) -> Result<()> {
        Err(BindError::TypeMismatch(format!(
            "{} property '{}' cannot be an identifier",
            Self::PROPERTY_TYPE,
            property
        )))
    }

    fn from_value(value: &Value) -> Result<Self>;
    fn into_value(self) -> Value;
}

fn mismatch(expected: PropertyType, found: &Value) -> BindError {
    BindError::TypeMismatch(format!("expected {}, found {}", expected, found.type_name()))
}

fn narrow<T: TryFrom<i64>>(value: i64, property: &str) -> Result<T> {
    T::try_from(value).map_err(|_| {
        BindError::TypeMismatch(format!(
            "value {} of '{}' does not fit {}",
            value,
            property,
            std::any::type_name::<T>()
        ))
    })
}

macro_rules! integer_property {
    ($($ty:ty),* $(,)?) => {$(
        impl PropertyValue for $ty {
            const PROPERTY_TYPE: PropertyType = PropertyType::Int;

            fn read(binding: &Binding, property: &str) -> Result<Self> {
                narrow(binding.get_int64(property)?, property)
            }

            fn write(self, binding: &Binding, property: &str) -> Result<()> {
                binding.set_int64(property, i64::from(self))
            }

            fn write_unique(self, binding: &Binding, property: &str) -> Result<()> {
                binding.set_int64_unique(property, i64::from(self))
            }

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Int(v) => narrow(*v, "value"),
                    other => Err(mismatch(Self::PROPERTY_TYPE, other)),
                }
            }

            fn into_value(self) -> Value {
                Value::Int(i64::from(self))
            }
        }

        impl PropertyValue for Option<$ty> {
            const PROPERTY_TYPE: PropertyType = PropertyType::Int;
            const NULLABLE: bool = true;

            fn read(binding: &Binding, property: &str) -> Result<Self> {
                binding
                    .get_nullable_int64(property)?
                    .map(|v| narrow(v, property))
                    .transpose()
            }

            fn write(self, binding: &Binding, property: &str) -> Result<()> {
                binding.set_nullable_int64(property, self.map(i64::from))
            }

            fn write_unique(self, binding: &Binding, property: &str) -> Result<()> {
                let value = self.ok_or(BindError::NullIdentifier)?;
                binding.set_int64_unique(property, i64::from(value))
            }

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Null => Ok(None),
                    other => <$ty>::from_value(other).map(Some),
                }
            }

            fn into_value(self) -> Value {
                self.map_or(Value::Null, |v| Value::Int(i64::from(v)))
            }
        }
    )*};
}

integer_property!(u8, i16, i32, i64);

fn char_from_i64(value: i64, property: &str) -> Result<char> {
    u32::try_from(value)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| {
            BindError::TypeMismatch(format!("value {} of '{}' is not a char", value, property))
        })
}

impl PropertyValue for char {
    const PROPERTY_TYPE: PropertyType = PropertyType::Int;

    fn read(binding: &Binding, property: &str) -> Result<Self> {
        char_from_i64(binding.get_int64(property)?, property)
    }

    fn write(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_int64(property, i64::from(u32::from(self)))
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => char_from_i64(*v, "value"),
            other => Err(mismatch(Self::PROPERTY_TYPE, other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Int(i64::from(u32::from(self)))
    }
}

impl PropertyValue for Option<char> {
    const PROPERTY_TYPE: PropertyType = PropertyType::Int;
    const NULLABLE: bool = true;

    fn read(binding: &Binding, property: &str) -> Result<Self> {
        binding
            .get_nullable_int64(property)?
            .map(|v| char_from_i64(v, property))
            .transpose()
    }

    fn write(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_nullable_int64(property, self.map(|c| i64::from(u32::from(c))))
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => char::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, char::into_value)
    }
}

/// Types with a direct accessor pair and a matching `Value` variant.
macro_rules! scalar_property {
    ($ty:ty, $kind:ident, $variant:ident, $get:ident, $get_nullable:ident, $set:ident, $set_nullable:ident) => {
        impl PropertyValue for $ty {
            const PROPERTY_TYPE: PropertyType = PropertyType::$kind;

            fn read(binding: &Binding, property: &str) -> Result<Self> {
                binding.$get(property)
            }

            fn write(self, binding: &Binding, property: &str) -> Result<()> {
                binding.$set(property, self)
            }

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(*v),
                    other => Err(mismatch(Self::PROPERTY_TYPE, other)),
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl PropertyValue for Option<$ty> {
            const PROPERTY_TYPE: PropertyType = PropertyType::$kind;
            const NULLABLE: bool = true;

            fn read(binding: &Binding, property: &str) -> Result<Self> {
                binding.$get_nullable(property)
            }

            fn write(self, binding: &Binding, property: &str) -> Result<()> {
                binding.$set_nullable(property, self)
            }

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Null => Ok(None),
                    other => <$ty>::from_value(other).map(Some),
                }
            }

            fn into_value(self) -> Value {
                self.map_or(Value::Null, Value::$variant)
            }
        }
    };
}

scalar_property!(bool, Bool, Bool, get_bool, get_nullable_bool, set_bool, set_nullable_bool);
scalar_property!(f32, Float, Float, get_float, get_nullable_float, set_float, set_nullable_float);
scalar_property!(
    f64,
    Double,
    Double,
    get_double,
    get_nullable_double,
    set_double,
    set_nullable_double
);

impl PropertyValue for String {
    const PROPERTY_TYPE: PropertyType = PropertyType::String;

    fn read(binding: &Binding, property: &str) -> Result<Self> {
        Ok(binding.get_string(property)?.unwrap_or_default())
    }

    fn write(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_string(property, Some(self.as_str()))
    }

    fn write_unique(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_string_unique(property, Some(self.as_str()))
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(v) => Ok(v.clone()),
            other => Err(mismatch(Self::PROPERTY_TYPE, other)),
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl PropertyValue for Option<String> {
    const PROPERTY_TYPE: PropertyType = PropertyType::String;
    const NULLABLE: bool = true;

    fn read(binding: &Binding, property: &str) -> Result<Self> {
        binding.get_string(property)
    }

    fn write(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_string(property, self.as_deref())
    }

    fn write_unique(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_string_unique(property, self.as_deref())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => String::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, Value::String)
    }
}

impl PropertyValue for Vec<u8> {
    const PROPERTY_TYPE: PropertyType = PropertyType::Data;

    fn read(binding: &Binding, property: &str) -> Result<Self> {
        Ok(binding.get_binary(property)?.unwrap_or_default())
    }

    fn write(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_binary(property, Some(self.as_slice()))
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Data(v) => Ok(v.clone()),
            other => Err(mismatch(Self::PROPERTY_TYPE, other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Data(self)
    }
}

impl PropertyValue for Option<Vec<u8>> {
    const PROPERTY_TYPE: PropertyType = PropertyType::Data;
    const NULLABLE: bool = true;

    fn read(binding: &Binding, property: &str) -> Result<Self> {
        binding.get_binary(property)
    }

    fn write(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_binary(property, self.as_deref())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => Vec::<u8>::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, Value::Data)
    }
}

impl PropertyValue for DateTime<FixedOffset> {
    const PROPERTY_TYPE: PropertyType = PropertyType::Date;

    fn read(binding: &Binding, property: &str) -> Result<Self> {
        binding.get_date(property)
    }

    fn write(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_date(property, &self)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(v) => Ok(*v),
            other => Err(mismatch(Self::PROPERTY_TYPE, other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Date(self)
    }
}

impl PropertyValue for Option<DateTime<FixedOffset>> {
    const PROPERTY_TYPE: PropertyType = PropertyType::Date;
    const NULLABLE: bool = true;

    fn read(binding: &Binding, property: &str) -> Result<Self> {
        binding.get_nullable_date(property)
    }

    fn write(self, binding: &Binding, property: &str) -> Result<()> {
        binding.set_nullable_date(property, self.as_ref())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => DateTime::<FixedOffset>::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, Value::Date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrowing_rejects_overflow() {
        assert_eq!(u8::from_value(&Value::Int(255)).unwrap(), 255);
        assert!(matches!(
            u8::from_value(&Value::Int(256)),
            Err(BindError::TypeMismatch(_))
        ));
        assert!(i16::from_value(&Value::Int(-40_000)).is_err());
        assert_eq!(i32::from_value(&Value::Int(-7)).unwrap(), -7);
    }

    #[test]
    fn test_nullable_values() {
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(&Value::Int(3)).unwrap(), Some(3));
        assert_eq!(Option::<String>::None.into_value(), Value::Null);
        assert_eq!(
            Some(Vec::<u8>::new()).into_value(),
            Value::Data(Vec::new())
        );
    }

    #[test]
    fn test_char_round_trip() {
        assert_eq!('x'.into_value(), Value::Int(120));
        assert_eq!(char::from_value(&Value::Int(120)).unwrap(), 'x');
        assert!(char::from_value(&Value::Int(0xD800)).is_err());
    }

    #[test]
    fn test_manifest_constants() {
        assert_eq!(<Option<f64> as PropertyValue>::PROPERTY_TYPE, PropertyType::Double);
        assert!(<Option<f64> as PropertyValue>::NULLABLE);
        assert!(!<String as PropertyValue>::NULLABLE);
    }
}
