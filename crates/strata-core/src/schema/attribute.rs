//! Attribute definitions for entities.

use super::types::AttributeType;
use crate::store::Value;
use serde::{Deserialize, Serialize};

/// An attribute definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name (unique within its entity).
    pub name: String,
    /// Attribute data type.
    pub attribute_type: AttributeType,
    /// Cross-version stable identity; `None` means the name is the identity.
    pub renaming_id: Option<String>,
    /// Default value used when a record does not carry the attribute.
    pub default: Option<Value>,
}

impl AttributeDef {
    /// Create a new required attribute.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            renaming_id: None,
            default: None,
        }
    }

    /// Create an optional attribute.
    pub fn optional(name: impl Into<String>, scalar: super::ScalarType) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::Optional(scalar),
            renaming_id: None,
            default: None,
        }
    }

    /// Set the renaming identity used to match this attribute across versions.
    pub fn with_renaming_id(mut self, id: impl Into<String>) -> Self {
        self.renaming_id = Some(id.into());
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// The cross-version identity of this attribute.
    ///
    /// Falls back to the attribute name when no explicit renaming identity
    /// was declared.
    pub fn renaming_identity(&self) -> &str {
        self.renaming_id.as_deref().unwrap_or(&self.name)
    }

    /// Feed this attribute's structure into an entity version hash.
    ///
    /// The renaming identity is deliberately excluded: it is matching
    /// metadata, not structure.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(self.name.as_bytes());
        hasher.update(&[0xfe]);
        hasher.update(&[self.attribute_type.scalar_type().hash_tag()]);
        hasher.update(&[self.attribute_type.is_optional() as u8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarType;

    #[test]
    fn test_attribute_builder() {
        let attr = AttributeDef::new("title", AttributeType::scalar(ScalarType::String))
            .with_renaming_id("heading")
            .with_default(Value::String("untitled".into()));

        assert_eq!(attr.name, "title");
        assert_eq!(attr.renaming_identity(), "heading");
        assert!(attr.default.is_some());
    }

    #[test]
    fn test_renaming_identity_falls_back_to_name() {
        let attr = AttributeDef::new("age", AttributeType::scalar(ScalarType::Int32));
        assert_eq!(attr.renaming_identity(), "age");
    }
}
