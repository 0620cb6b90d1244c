//! Entity definitions.

use super::attribute::AttributeDef;
use super::relationship::RelationshipDef;
use serde::{Deserialize, Serialize};

/// A structural version hash of one entity.
///
/// Two entities with equal hashes are byte-for-byte copyable across schema
/// versions. The hash covers attribute and relationship structure but not
/// the entity's own name, so a pure rename hashes identically.
pub type VersionHash = [u8; 32];

/// An entity definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within a schema model).
    pub name: String,
    /// Name of the attribute holding the record identity.
    pub identity_attribute: String,
    /// Attribute definitions.
    pub attributes: Vec<AttributeDef>,
    /// Relationship definitions.
    pub relationships: Vec<RelationshipDef>,
    /// Cross-version stable identity; `None` means the name is the identity.
    pub renaming_id: Option<String>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>, identity_attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_attribute: identity_attribute.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            renaming_id: None,
        }
    }

    /// Add an attribute to the entity.
    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add multiple attributes.
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = AttributeDef>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Add a relationship to the entity.
    pub fn with_relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Set the renaming identity used to match this entity across versions.
    pub fn with_renaming_id(mut self, id: impl Into<String>) -> Self {
        self.renaming_id = Some(id.into());
        self
    }

    /// Get an attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get a relationship by name.
    pub fn get_relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Get an attribute by its cross-version renaming identity.
    pub fn attribute_by_renaming_identity(&self, identity: &str) -> Option<&AttributeDef> {
        self.attributes
            .iter()
            .find(|a| a.renaming_identity() == identity)
    }

    /// Get a relationship by its cross-version renaming identity.
    pub fn relationship_by_renaming_identity(&self, identity: &str) -> Option<&RelationshipDef> {
        self.relationships
            .iter()
            .find(|r| r.renaming_identity() == identity)
    }

    /// The cross-version identity of this entity.
    pub fn renaming_identity(&self) -> &str {
        self.renaming_id.as_deref().unwrap_or(&self.name)
    }

    /// Compute the structural version hash of this entity.
    ///
    /// Attributes and relationships contribute in sorted-by-name order so
    /// declaration order does not affect the hash. The entity's own name is
    /// excluded.
    pub fn version_hash(&self) -> VersionHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.identity_attribute.as_bytes());
        hasher.update(&[0xff]);

        let mut attributes: Vec<&AttributeDef> = self.attributes.iter().collect();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));
        for attribute in attributes {
            attribute.hash_into(&mut hasher);
        }

        let mut relationships: Vec<&RelationshipDef> = self.relationships.iter().collect();
        relationships.sort_by(|a, b| a.name.cmp(&b.name));
        for relationship in relationships {
            relationship.hash_into(&mut hasher);
        }

        *hasher.finalize().as_bytes()
    }
}
