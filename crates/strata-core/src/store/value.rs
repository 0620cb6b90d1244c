//! Runtime value types for records.

use crate::schema::{AttributeType, ScalarType};
use std::cmp::Ordering;

/// A runtime value stored in a record.
///
/// This enum represents every value a record attribute or relationship can
/// hold. It maps to the scalar types defined in the schema; relationships
/// are stored as `Uuid` (to-one) or `UuidArray` (to-many).
#[derive(
    Debug,
    Clone,
    PartialEq,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit floating point.
    Float32(f32),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// UUID as 16 bytes.
    Uuid([u8; 16]),
    /// Array of UUIDs (to-many relationship values).
    UuidArray(Vec<[u8; 16]>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64, widening from Int32.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64, widening from Float32.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a UUID.
    pub fn as_uuid(&self) -> Option<[u8; 16]> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    /// Check whether this value is assignable to the given attribute type.
    ///
    /// Null is assignable to optional attributes only.
    pub fn matches_type(&self, attribute_type: &AttributeType) -> bool {
        if self.is_null() {
            return attribute_type.is_optional();
        }
        matches!(
            (self, attribute_type.scalar_type()),
            (Value::Bool(_), ScalarType::Bool)
                | (Value::Int32(_), ScalarType::Int32)
                | (Value::Int64(_), ScalarType::Int64)
                | (Value::Float32(_), ScalarType::Float32)
                | (Value::Float64(_), ScalarType::Float64)
                | (Value::String(_), ScalarType::String)
                | (Value::Bytes(_), ScalarType::Bytes)
                | (Value::Timestamp(_), ScalarType::Timestamp)
                | (Value::Uuid(_), ScalarType::Uuid)
        )
    }

    /// Compare two values for filter and sort evaluation.
    ///
    /// Integers and floats compare across widths; other kinds compare only
    /// against the same kind. Returns `None` for incomparable pairs.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            _ => {
                if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
                    return Some(a.cmp(&b));
                }
                if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                    return a.partial_cmp(&b);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Int32(7).as_i64(), Some(7));
        assert_eq!(Value::Int64(7).as_i64(), Some(7));
        assert_eq!(Value::Float32(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::String("a".into()).as_str(), Some("a"));
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_type_matching() {
        let required = AttributeType::scalar(ScalarType::String);
        let optional = AttributeType::optional(ScalarType::String);

        assert!(Value::String("x".into()).matches_type(&required));
        assert!(!Value::Int64(1).matches_type(&required));
        assert!(!Value::Null.matches_type(&required));
        assert!(Value::Null.matches_type(&optional));
    }

    #[test]
    fn test_compare_across_widths() {
        assert_eq!(
            Value::Int32(2).compare(&Value::Int64(3)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float32(2.0).compare(&Value::Float64(2.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Bool(true).compare(&Value::Int64(1)), None);
    }
}
