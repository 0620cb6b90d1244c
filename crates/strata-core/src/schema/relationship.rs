//! Relationship definitions between entities.

use serde::{Deserialize, Serialize};

/// A relationship from one entity to another.
///
/// Relationship values are stored as record ids on the owning record
/// ([`Value::Uuid`](crate::store::Value::Uuid) for to-one,
/// [`Value::UuidArray`](crate::store::Value::UuidArray) for to-many).
/// Record ids are stable across migration, so relationship values survive
/// copy and transform passes by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDef {
    /// Relationship name (unique within its entity, shared namespace with
    /// attributes).
    pub name: String,
    /// Name of the destination entity.
    pub destination_entity: String,
    /// Whether this relationship holds many destination records.
    pub to_many: bool,
    /// Cross-version stable identity; `None` means the name is the identity.
    pub renaming_id: Option<String>,
}

impl RelationshipDef {
    /// Create a to-one relationship.
    pub fn to_one(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination_entity: destination.into(),
            to_many: false,
            renaming_id: None,
        }
    }

    /// Create a to-many relationship.
    pub fn to_many(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination_entity: destination.into(),
            to_many: true,
            renaming_id: None,
        }
    }

    /// Set the renaming identity used to match this relationship across
    /// versions.
    pub fn with_renaming_id(mut self, id: impl Into<String>) -> Self {
        self.renaming_id = Some(id.into());
        self
    }

    /// The cross-version identity of this relationship.
    pub fn renaming_identity(&self) -> &str {
        self.renaming_id.as_deref().unwrap_or(&self.name)
    }

    /// Feed this relationship's structure into an entity version hash.
    ///
    /// The destination entity's *name* is excluded so that renaming an
    /// unrelated entity does not reclassify this one; cardinality and the
    /// relationship's own name are structural.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(self.name.as_bytes());
        hasher.update(&[0xfd]);
        hasher.update(&[self.to_many as u8]);
    }
}
