//! Schema model - one named, immutable snapshot of the object model.

use super::entity::{EntityDef, VersionHash};
use crate::error::{Error, InternalError};
use crate::store::StoreMetadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named snapshot of the entire schema at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    /// Version identifier (unique within a [`SchemaHistory`](super::SchemaHistory)).
    pub version: String,
    /// Entity definitions keyed by name.
    pub entities: HashMap<String, EntityDef>,
}

impl SchemaModel {
    /// Create an empty schema model.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            entities: HashMap::new(),
        }
    }

    /// Add an entity to the model.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    /// Index entities by their cross-version renaming identity.
    pub fn entities_by_renaming_identity(&self) -> HashMap<&str, &EntityDef> {
        self.entities
            .values()
            .map(|e| (e.renaming_identity(), e))
            .collect()
    }

    /// Per-entity structural version hashes, keyed by entity name.
    pub fn entity_hashes(&self) -> HashMap<String, VersionHash> {
        self.entities
            .values()
            .map(|e| (e.name.clone(), e.version_hash()))
            .collect()
    }

    /// Check whether a store persisted with the given metadata is
    /// schema-compatible with this model.
    ///
    /// Compatibility requires the same entity name set with byte-equal
    /// version hashes; the persisted version string itself is not compared,
    /// since two identically-structured models are interchangeable on disk.
    pub fn is_compatible_with(&self, metadata: &StoreMetadata) -> bool {
        let hashes = self.entity_hashes();
        if hashes.len() != metadata.entity_hashes.len() {
            return false;
        }
        hashes
            .iter()
            .all(|(name, hash)| metadata.entity_hashes.get(name) == Some(hash))
    }

    /// Check whether two models describe the exact same schema.
    pub fn structurally_equal(&self, other: &SchemaModel) -> bool {
        self.entity_hashes() == other.entity_hashes()
    }

    /// Serialize the model as JSON, for tooling and diagnostics.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(InternalError::Serialization(e.to_string())))
    }

    /// Deserialize a model from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|e| Error::Internal(InternalError::Deserialization(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDef, AttributeType, ScalarType};

    fn sample_model(version: &str) -> SchemaModel {
        SchemaModel::new(version)
            .with_entity(
                EntityDef::new("Person", "id")
                    .with_attribute(AttributeDef::new(
                        "id",
                        AttributeType::scalar(ScalarType::Uuid),
                    ))
                    .with_attribute(AttributeDef::new(
                        "name",
                        AttributeType::scalar(ScalarType::String),
                    )),
            )
            .with_entity(
                EntityDef::new("Pet", "id").with_attribute(AttributeDef::new(
                    "id",
                    AttributeType::scalar(ScalarType::Uuid),
                )),
            )
    }

    #[test]
    fn test_model_builder() {
        let model = sample_model("v1");
        assert_eq!(model.version, "v1");
        assert_eq!(model.entities.len(), 2);
        assert!(model.get_entity("Person").is_some());
        assert!(model.get_entity("Missing").is_none());
    }

    #[test]
    fn test_metadata_compatibility() {
        let model = sample_model("v1");
        let metadata = StoreMetadata::for_model(&model);
        assert!(model.is_compatible_with(&metadata));

        let v2 = sample_model("v2");
        // Same structure, different version string: still compatible.
        assert!(v2.is_compatible_with(&metadata));

        let changed = SchemaModel::new("v3").with_entity(
            EntityDef::new("Person", "id").with_attribute(AttributeDef::new(
                "id",
                AttributeType::scalar(ScalarType::Uuid),
            )),
        );
        assert!(!changed.is_compatible_with(&metadata));
    }

    #[test]
    fn test_json_roundtrip() {
        let model = sample_model("v1");
        let json = model.to_json().unwrap();
        let decoded = SchemaModel::from_json(&json).unwrap();
        assert_eq!(model, decoded);
    }

    #[test]
    fn test_renaming_identity_index() {
        let model = SchemaModel::new("v2").with_entity(
            EntityDef::new("Animal", "id")
                .with_attribute(AttributeDef::new(
                    "id",
                    AttributeType::scalar(ScalarType::Uuid),
                ))
                .with_renaming_id("Pet"),
        );

        let index = model.entities_by_renaming_identity();
        assert!(index.contains_key("Pet"));
        assert!(!index.contains_key("Animal"));
    }
}
