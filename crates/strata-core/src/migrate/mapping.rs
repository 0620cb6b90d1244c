//! Entity mapping resolution.
//!
//! A mapping model describes, per entity, how source records become
//! destination records across one version hop. Callers may declare explicit
//! mappings; everything not explicitly mentioned is classified by
//! structural inference over the two models.

use crate::error::Error;
use crate::schema::{EntityDef, SchemaModel};
use crate::store::{Record, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A caller-supplied record transformer.
///
/// The closure receives a read-only proxy over the source record and a
/// lazily-instantiated proxy for the destination record. The destination
/// record is only created once the closure writes to it; a closure that
/// never touches the destination drops the source record from the migrated
/// store.
pub type Transformer =
    Arc<dyn Fn(&SourceObject<'_>, &mut DestinationObject<'_>) -> Result<(), Error> + Send + Sync>;

/// An explicit, caller-declared entity mapping.
#[derive(Clone)]
pub enum EntityMapping {
    /// Drop every instance of a source entity.
    DeleteEntity {
        /// Source entity name.
        source_entity: String,
    },
    /// Add a destination entity with no source counterpart.
    InsertEntity {
        /// Destination entity name.
        destination_entity: String,
    },
    /// Carry instances over verbatim. Source and destination structure must
    /// hash identically.
    CopyEntity {
        /// Source entity name.
        source_entity: String,
        /// Destination entity name.
        destination_entity: String,
    },
    /// Rebuild each instance through a caller-supplied transformer.
    TransformEntity {
        /// Source entity name.
        source_entity: String,
        /// Destination entity name.
        destination_entity: String,
        /// The record transformer.
        transformer: Transformer,
    },
}

impl EntityMapping {
    /// Declare a delete mapping.
    pub fn delete_entity(source: impl Into<String>) -> Self {
        EntityMapping::DeleteEntity {
            source_entity: source.into(),
        }
    }

    /// Declare an insert mapping.
    pub fn insert_entity(destination: impl Into<String>) -> Self {
        EntityMapping::InsertEntity {
            destination_entity: destination.into(),
        }
    }

    /// Declare a copy mapping.
    pub fn copy_entity(source: impl Into<String>, destination: impl Into<String>) -> Self {
        EntityMapping::CopyEntity {
            source_entity: source.into(),
            destination_entity: destination.into(),
        }
    }

    /// Declare a transform mapping.
    pub fn transform_entity<F>(
        source: impl Into<String>,
        destination: impl Into<String>,
        transformer: F,
    ) -> Self
    where
        F: Fn(&SourceObject<'_>, &mut DestinationObject<'_>) -> Result<(), Error>
            + Send
            + Sync
            + 'static,
    {
        EntityMapping::TransformEntity {
            source_entity: source.into(),
            destination_entity: destination.into(),
            transformer: Arc::new(transformer),
        }
    }
}

impl fmt::Debug for EntityMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityMapping::DeleteEntity { source_entity } => {
                f.debug_struct("DeleteEntity").field("source_entity", source_entity).finish()
            }
            EntityMapping::InsertEntity { destination_entity } => f
                .debug_struct("InsertEntity")
                .field("destination_entity", destination_entity)
                .finish(),
            EntityMapping::CopyEntity {
                source_entity,
                destination_entity,
            } => f
                .debug_struct("CopyEntity")
                .field("source_entity", source_entity)
                .field("destination_entity", destination_entity)
                .finish(),
            EntityMapping::TransformEntity {
                source_entity,
                destination_entity,
                ..
            } => f
                .debug_struct("TransformEntity")
                .field("source_entity", source_entity)
                .field("destination_entity", destination_entity)
                .finish_non_exhaustive(),
        }
    }
}

/// A (source attribute, destination attribute) correspondence table,
/// matched by renaming identity with a same-name fallback.
pub type AttributeCorrespondence = Vec<(String, String)>;

/// Resolved delete mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteMapping {
    /// Source entity whose instances are dropped.
    pub source_entity: String,
}

/// Resolved insert mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertMapping {
    /// Destination entity being added.
    pub destination_entity: String,
    /// Every destination attribute and relationship name, enumerated as
    /// to-be-populated properties. There are no source instances to
    /// populate them from.
    pub properties: Vec<String>,
}

/// Resolved copy mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyMapping {
    /// Source entity name.
    pub source_entity: String,
    /// Destination entity name (may differ from the source under a rename).
    pub destination_entity: String,
    /// Attribute correspondence, matched by renaming identity.
    pub attributes: AttributeCorrespondence,
    /// Relationship correspondence, matched by renaming identity.
    pub relationships: AttributeCorrespondence,
}

/// Resolved transform mapping.
#[derive(Clone)]
pub struct TransformMapping {
    /// Source entity name.
    pub source_entity: String,
    /// Destination entity name.
    pub destination_entity: String,
    /// Attribute correspondence, matched by renaming identity.
    pub attributes: AttributeCorrespondence,
    /// Relationship correspondence, matched by renaming identity.
    pub relationships: AttributeCorrespondence,
    /// Caller transformer; `None` uses the default structural copy.
    pub transformer: Option<Transformer>,
}

impl fmt::Debug for TransformMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformMapping")
            .field("source_entity", &self.source_entity)
            .field("destination_entity", &self.destination_entity)
            .field("attributes", &self.attributes)
            .field("custom", &self.transformer.is_some())
            .finish()
    }
}

/// A fully resolved mapping model for one version hop.
///
/// Every entity of both models is covered exactly once across the four
/// mapping sets.
#[derive(Debug, Clone, Default)]
pub struct MappingModel {
    /// Source model version.
    pub source_version: String,
    /// Destination model version.
    pub destination_version: String,
    /// Entities dropped.
    pub deletes: Vec<DeleteMapping>,
    /// Entities added.
    pub inserts: Vec<InsertMapping>,
    /// Entities carried over verbatim.
    pub copies: Vec<CopyMapping>,
    /// Entities rebuilt per record.
    pub transforms: Vec<TransformMapping>,
}

impl MappingModel {
    /// Check whether any entity requires a per-record transform pass.
    pub fn has_transforms(&self) -> bool {
        !self.transforms.is_empty()
    }

    /// Total number of entity mappings.
    pub fn mapping_count(&self) -> usize {
        self.deletes.len() + self.inserts.len() + self.copies.len() + self.transforms.len()
    }
}

/// Read-only proxy over one source record during a transform.
pub struct SourceObject<'a> {
    entity: &'a EntityDef,
    id: [u8; 16],
    record: &'a Record,
}

impl<'a> SourceObject<'a> {
    pub(crate) fn new(entity: &'a EntityDef, id: [u8; 16], record: &'a Record) -> Self {
        Self { entity, id, record }
    }

    /// The record id.
    pub fn id(&self) -> [u8; 16] {
        self.id
    }

    /// The source entity definition.
    pub fn entity(&self) -> &EntityDef {
        self.entity
    }

    /// Read an attribute or relationship value by name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.record.get(name)
    }
}

/// Lazily-instantiated, mutable proxy for one destination record.
///
/// The underlying record is created on the first write access and memoized;
/// if no write ever happens the source record is dropped from the migrated
/// store.
pub struct DestinationObject<'a> {
    entity: &'a EntityDef,
    record: Option<Record>,
}

impl<'a> DestinationObject<'a> {
    pub(crate) fn new(entity: &'a EntityDef) -> Self {
        Self {
            entity,
            record: None,
        }
    }

    /// The destination entity definition.
    pub fn entity(&self) -> &EntityDef {
        self.entity
    }

    /// Whether the destination record has been instantiated yet.
    pub fn is_instantiated(&self) -> bool {
        self.record.is_some()
    }

    /// Write a value, instantiating the destination record on first access.
    ///
    /// Writing to a name the destination entity does not declare fails with
    /// [`Error::User`].
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Result<(), Error> {
        let name = name.into();
        if self.entity.get_attribute(&name).is_none()
            && self.entity.get_relationship(&name).is_none()
        {
            return Err(Error::User(format!(
                "entity {:?} declares no property named {name:?}",
                self.entity.name
            )));
        }
        self.record_mut().set(name, value);
        Ok(())
    }

    /// Default structural copy: carry over every source value whose
    /// attribute or relationship matches a destination property by renaming
    /// identity (falling back to an identical name).
    pub fn copy_matching_attributes(&mut self, source: &SourceObject<'_>) -> Result<(), Error> {
        let correspondence =
            property_correspondence(source.entity(), self.entity);
        for (source_name, destination_name) in correspondence {
            if let Some(value) = source.value(&source_name) {
                let value = value.clone();
                self.record_mut().set(destination_name, value);
            }
        }
        Ok(())
    }

    fn record_mut(&mut self) -> &mut Record {
        self.record.get_or_insert_with(Record::new)
    }

    /// Finish the transform, yielding the destination record if it was
    /// instantiated. Declared attribute defaults fill any absent values.
    pub(crate) fn into_record(self) -> Option<Record> {
        let entity = self.entity;
        let mut record = self.record?;
        for attribute in &entity.attributes {
            if !record.contains(&attribute.name) {
                if let Some(default) = &attribute.default {
                    record.set(attribute.name.clone(), default.clone());
                }
            }
        }
        Some(record)
    }
}

/// Compute the attribute correspondence between two entities, matched by
/// renaming identity.
pub(crate) fn attribute_correspondence(
    source: &EntityDef,
    destination: &EntityDef,
) -> AttributeCorrespondence {
    let mut pairs = Vec::new();
    for attribute in &destination.attributes {
        if let Some(matched) = source.attribute_by_renaming_identity(attribute.renaming_identity())
        {
            pairs.push((matched.name.clone(), attribute.name.clone()));
        }
    }
    pairs
}

/// Compute the relationship correspondence between two entities, matched by
/// renaming identity. Relationship values are stable record ids and migrate
/// by value copy.
pub(crate) fn relationship_correspondence(
    source: &EntityDef,
    destination: &EntityDef,
) -> AttributeCorrespondence {
    let mut pairs = Vec::new();
    for relationship in &destination.relationships {
        if let Some(matched) =
            source.relationship_by_renaming_identity(relationship.renaming_identity())
        {
            pairs.push((matched.name.clone(), relationship.name.clone()));
        }
    }
    pairs
}

fn property_correspondence(source: &EntityDef, destination: &EntityDef) -> AttributeCorrespondence {
    let mut pairs = attribute_correspondence(source, destination);
    pairs.extend(relationship_correspondence(source, destination));
    pairs
}

/// Reconcile explicit entity mappings with structural inference.
///
/// Every entity of both models ends up in exactly one of the four mapping
/// sets. Invalid explicit mappings - unknown entities, duplicated
/// sources/destinations, a copy between entities whose version hashes
/// differ - are programmer errors and panic immediately.
pub fn resolve_entity_mappings(
    explicit: &[EntityMapping],
    source: &SchemaModel,
    destination: &SchemaModel,
) -> MappingModel {
    let mut model = MappingModel {
        source_version: source.version.clone(),
        destination_version: destination.version.clone(),
        ..Default::default()
    };

    // Validate explicit mappings and record which entities they cover.
    let mut explicit_sources: HashSet<&str> = HashSet::new();
    let mut explicit_destinations: HashSet<&str> = HashSet::new();
    for mapping in explicit {
        match mapping {
            EntityMapping::DeleteEntity { source_entity } => {
                let entity = require_source_entity(source, source_entity);
                claim_source(&mut explicit_sources, &entity.name);
            }
            EntityMapping::InsertEntity { destination_entity } => {
                let entity = require_destination_entity(destination, destination_entity);
                claim_destination(&mut explicit_destinations, &entity.name);
            }
            EntityMapping::CopyEntity {
                source_entity,
                destination_entity,
            } => {
                let source_def = require_source_entity(source, source_entity);
                let destination_def = require_destination_entity(destination, destination_entity);
                assert!(
                    source_def.version_hash() == destination_def.version_hash(),
                    "copy mapping {source_entity:?} -> {destination_entity:?} declared between \
                     entities with different version hashes; declare a transform instead"
                );
                claim_source(&mut explicit_sources, &source_def.name);
                claim_destination(&mut explicit_destinations, &destination_def.name);
            }
            EntityMapping::TransformEntity {
                source_entity,
                destination_entity,
                ..
            } => {
                require_source_entity(source, source_entity);
                require_destination_entity(destination, destination_entity);
                claim_source(&mut explicit_sources, source_entity);
                claim_destination(&mut explicit_destinations, destination_entity);
            }
        }
    }

    // Partition the remaining entities by renaming identity. An identity
    // matched on both sides pairs up only when neither side was claimed
    // explicitly; a half-claimed pair decays into independent one-sided
    // operations.
    let source_by_identity = source.entities_by_renaming_identity();
    let destination_by_identity = destination.entities_by_renaming_identity();

    for (identity, source_def) in &source_by_identity {
        if explicit_sources.contains(source_def.name.as_str()) {
            continue;
        }
        match destination_by_identity.get(identity) {
            Some(destination_def)
                if !explicit_destinations.contains(destination_def.name.as_str()) =>
            {
                if source_def.version_hash() == destination_def.version_hash() {
                    model.copies.push(CopyMapping {
                        source_entity: source_def.name.clone(),
                        destination_entity: destination_def.name.clone(),
                        attributes: attribute_correspondence(source_def, destination_def),
                        relationships: relationship_correspondence(source_def, destination_def),
                    });
                } else {
                    model.transforms.push(TransformMapping {
                        source_entity: source_def.name.clone(),
                        destination_entity: destination_def.name.clone(),
                        attributes: attribute_correspondence(source_def, destination_def),
                        relationships: relationship_correspondence(source_def, destination_def),
                        transformer: None,
                    });
                }
            }
            _ => {
                // Present in source only, or its partner was explicitly
                // handled on the destination side.
                model.deletes.push(DeleteMapping {
                    source_entity: source_def.name.clone(),
                });
            }
        }
    }

    for (identity, destination_def) in &destination_by_identity {
        if explicit_destinations.contains(destination_def.name.as_str()) {
            continue;
        }
        let paired = source_by_identity
            .get(identity)
            .is_some_and(|s| !explicit_sources.contains(s.name.as_str()));
        if !paired {
            model.inserts.push(InsertMapping {
                destination_entity: destination_def.name.clone(),
                properties: enumerate_properties(destination_def),
            });
        }
    }

    // Materialize the explicit mappings themselves.
    for mapping in explicit {
        match mapping {
            EntityMapping::DeleteEntity { source_entity } => {
                model.deletes.push(DeleteMapping {
                    source_entity: source_entity.clone(),
                });
            }
            EntityMapping::InsertEntity { destination_entity } => {
                let entity = require_destination_entity(destination, destination_entity);
                model.inserts.push(InsertMapping {
                    destination_entity: destination_entity.clone(),
                    properties: enumerate_properties(entity),
                });
            }
            EntityMapping::CopyEntity {
                source_entity,
                destination_entity,
            } => {
                let source_def = require_source_entity(source, source_entity);
                let destination_def = require_destination_entity(destination, destination_entity);
                model.copies.push(CopyMapping {
                    source_entity: source_entity.clone(),
                    destination_entity: destination_entity.clone(),
                    attributes: attribute_correspondence(source_def, destination_def),
                    relationships: relationship_correspondence(source_def, destination_def),
                });
            }
            EntityMapping::TransformEntity {
                source_entity,
                destination_entity,
                transformer,
            } => {
                let source_def = require_source_entity(source, source_entity);
                let destination_def = require_destination_entity(destination, destination_entity);
                model.transforms.push(TransformMapping {
                    source_entity: source_entity.clone(),
                    destination_entity: destination_entity.clone(),
                    attributes: attribute_correspondence(source_def, destination_def),
                    relationships: relationship_correspondence(source_def, destination_def),
                    transformer: Some(Arc::clone(transformer)),
                });
            }
        }
    }

    debug_assert_eq!(
        model.deletes.len() + model.copies.len() + model.transforms.len(),
        source.entities.len(),
        "every source entity must be mapped exactly once"
    );
    debug_assert_eq!(
        model.inserts.len() + model.copies.len() + model.transforms.len(),
        destination.entities.len(),
        "every destination entity must be mapped exactly once"
    );

    model
}

fn require_source_entity<'a>(model: &'a SchemaModel, name: &str) -> &'a EntityDef {
    model.get_entity(name).unwrap_or_else(|| {
        panic!(
            "explicit mapping names source entity {name:?}, absent from model {:?}",
            model.version
        )
    })
}

fn require_destination_entity<'a>(model: &'a SchemaModel, name: &str) -> &'a EntityDef {
    model.get_entity(name).unwrap_or_else(|| {
        panic!(
            "explicit mapping names destination entity {name:?}, absent from model {:?}",
            model.version
        )
    })
}

fn claim_source<'a>(claimed: &mut HashSet<&'a str>, name: &'a str) {
    assert!(
        claimed.insert(name),
        "entity {name:?} appears as the source of more than one explicit mapping"
    );
}

fn claim_destination<'a>(claimed: &mut HashSet<&'a str>, name: &'a str) {
    assert!(
        claimed.insert(name),
        "entity {name:?} appears as the destination of more than one explicit mapping"
    );
}

fn enumerate_properties(entity: &EntityDef) -> Vec<String> {
    entity
        .attributes
        .iter()
        .map(|a| a.name.clone())
        .chain(entity.relationships.iter().map(|r| r.name.clone()))
        .collect()
}
