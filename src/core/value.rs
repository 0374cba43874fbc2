use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::fmt;

/// A property value held outside the store.
///
/// Standalone objects keep their fields as `Value`s; the first transition to
/// managed copies them into the row through the accessor layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Data(Vec<u8>),
    Date(DateTime<FixedOffset>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Data(_) => "data",
            Self::Date(_) => "date",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "{}", s),
            Self::Data(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

pub(crate) fn unix_epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
}

/// Converts an offset-aware timestamp to the stored representation.
///
/// Sub-millisecond precision is dropped.
pub fn to_unix_millis(value: &DateTime<FixedOffset>) -> i64 {
    value.timestamp_millis()
}

/// Inverse of [`to_unix_millis`]; the result carries a zero UTC offset.
pub fn from_unix_millis(millis: i64) -> Option<DateTime<FixedOffset>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|d| d.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_conversion_keeps_instant() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2015, 12, 1, 10, 30, 0).unwrap();
        let millis = to_unix_millis(&local);
        let back = from_unix_millis(millis).unwrap();
        assert_eq!(back, local);
        assert_eq!(back.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_negative_millis() {
        let before_epoch = from_unix_millis(-1).unwrap();
        assert_eq!(to_unix_millis(&before_epoch), -1);
    }
}
