//! Mapping providers and provider resolution.

use super::mapping::{resolve_entity_mappings, EntityMapping, MappingModel};
use super::plan::MigrationKind;
use crate::error::Error;
use crate::schema::SchemaModel;
use std::sync::Arc;

/// Produces a mapping model for one version hop.
pub trait MappingProvider: Send + Sync {
    /// Whether this provider covers the given version pair.
    fn handles(&self, source_version: &str, destination_version: &str) -> bool;

    /// Materialize the mapping model and the migration kind for the hop.
    fn create_mapping(
        &self,
        source: &SchemaModel,
        destination: &SchemaModel,
    ) -> Result<(MappingModel, MigrationKind), Error>;
}

/// A provider carrying caller-declared entity mappings for one specific
/// version pair.
///
/// Explicit mappings always migrate through the mapped (heavyweight) path;
/// the per-record transformers cannot run in-place.
pub struct CustomMappingProvider {
    source_version: String,
    destination_version: String,
    mappings: Vec<EntityMapping>,
}

impl CustomMappingProvider {
    /// Create a provider for the given version pair.
    pub fn new(
        source_version: impl Into<String>,
        destination_version: impl Into<String>,
        mappings: Vec<EntityMapping>,
    ) -> Self {
        Self {
            source_version: source_version.into(),
            destination_version: destination_version.into(),
            mappings,
        }
    }
}

impl MappingProvider for CustomMappingProvider {
    fn handles(&self, source_version: &str, destination_version: &str) -> bool {
        self.source_version == source_version && self.destination_version == destination_version
    }

    fn create_mapping(
        &self,
        source: &SchemaModel,
        destination: &SchemaModel,
    ) -> Result<(MappingModel, MigrationKind), Error> {
        let model = resolve_entity_mappings(&self.mappings, source, destination);
        let kind = MigrationKind::Heavyweight {
            from: source.version.clone(),
            to: destination.version.clone(),
        };
        Ok((model, kind))
    }
}

/// Structural-inference provider, the fallback for every version pair.
///
/// The hop is lightweight when inference resolves every entity to a copy,
/// insert, or delete; any inferred transform forces the mapped path.
#[derive(Debug, Default, Clone, Copy)]
pub struct InferredMappingProvider;

impl MappingProvider for InferredMappingProvider {
    fn handles(&self, _source_version: &str, _destination_version: &str) -> bool {
        true
    }

    fn create_mapping(
        &self,
        source: &SchemaModel,
        destination: &SchemaModel,
    ) -> Result<(MappingModel, MigrationKind), Error> {
        let model = resolve_entity_mappings(&[], source, destination);
        let kind = if model.has_transforms() {
            MigrationKind::Heavyweight {
                from: source.version.clone(),
                to: destination.version.clone(),
            }
        } else {
            MigrationKind::Lightweight {
                from: source.version.clone(),
                to: destination.version.clone(),
            }
        };
        Ok((model, kind))
    }
}

/// Resolve the mapping for one hop.
///
/// Providers are tried in order; the first whose declared version pair
/// matches produces the mapping. When none match, structural inference is
/// the fallback, so resolution itself always succeeds for registered
/// models.
pub fn find_mapping(
    providers: &[Arc<dyn MappingProvider>],
    source: &SchemaModel,
    destination: &SchemaModel,
) -> Result<(MappingModel, MigrationKind), Error> {
    for provider in providers {
        if provider.handles(&source.version, &destination.version) {
            return provider.create_mapping(source, destination);
        }
    }
    InferredMappingProvider.create_mapping(source, destination)
}
