//! Persisted store metadata.

use crate::error::{Error, InternalError};
use crate::schema::SchemaModel;
use std::collections::BTreeMap;

/// Schema metadata persisted inside a store's meta tree.
///
/// The metadata records which model version the store's records were last
/// written under, plus each entity's structural version hash. The planner
/// compares these hashes against the current model to decide whether any
/// migration is needed at all.
#[derive(Debug, Clone, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub struct StoreMetadata {
    /// Version identifier the store was last written under.
    pub model_version: String,
    /// Structural version hash per entity, keyed by entity name.
    pub entity_hashes: BTreeMap<String, [u8; 32]>,
}

impl StoreMetadata {
    /// Build the metadata describing a model.
    pub fn for_model(model: &SchemaModel) -> Self {
        Self {
            model_version: model.version.clone(),
            entity_hashes: model.entity_hashes().into_iter().collect(),
        }
    }

    /// Serialize the metadata to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Internal(InternalError::Serialization(e.to_string())))
    }

    /// Deserialize metadata from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Internal(InternalError::Deserialization(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDef, AttributeType, EntityDef, ScalarType};

    #[test]
    fn test_metadata_roundtrip() {
        let model = SchemaModel::new("v1").with_entity(
            EntityDef::new("Person", "id").with_attribute(AttributeDef::new(
                "id",
                AttributeType::scalar(ScalarType::Uuid),
            )),
        );

        let metadata = StoreMetadata::for_model(&model);
        let bytes = metadata.to_bytes().unwrap();
        let decoded = StoreMetadata::from_bytes(&bytes).unwrap();

        assert_eq!(metadata, decoded);
        assert_eq!(decoded.model_version, "v1");
        assert_eq!(decoded.entity_hashes.len(), 1);
    }
}
