//! Record type for stored values.

use super::value::Value;
use crate::error::{Error, InternalError};
use std::collections::BTreeMap;

/// A stored record: an attribute-name to value map.
///
/// The record identity lives in the store key, not in the record itself.
#[derive(
    Debug, Clone, PartialEq, Default, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize,
)]
pub struct Record {
    /// Attribute and relationship values keyed by name.
    pub values: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by attribute name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Builder-style set.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Check whether an attribute is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Remove a value by attribute name.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Number of values in the record.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the record holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Internal(InternalError::Serialization(e.to_string())))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Internal(InternalError::Deserialization(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let record = Record::new()
            .with("name", Value::String("Ada".into()))
            .with("age", Value::Int32(36))
            .with("id", Value::Uuid([7u8; 16]));

        let bytes = record.to_bytes().unwrap();
        let decoded = Record::from_bytes(&bytes).unwrap();

        assert_eq!(record, decoded);
        assert_eq!(decoded.get("name"), Some(&Value::String("Ada".into())));
        assert_eq!(decoded.len(), 3);
    }

    #[test]
    fn test_set_replaces() {
        let mut record = Record::new().with("age", Value::Int32(1));
        record.set("age", Value::Int32(2));
        assert_eq!(record.get("age"), Some(&Value::Int32(2)));
        assert_eq!(record.len(), 1);
    }
}
