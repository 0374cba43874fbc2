pub mod error;
pub mod types;
pub mod value;

pub use error::{BindError, ErrorKind, Result};
pub use types::{ObjectSchema, Property, PropertyType, Schema, SchemaVersion};
pub use value::{Value, from_unix_millis, to_unix_millis};
