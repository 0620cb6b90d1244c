//! Mapped migration: the object-by-object copy/transform pass.

use super::mapping::{DestinationObject, MappingModel, SourceObject};
use crate::error::{Error, InternalError};
use crate::schema::{EntityDef, SchemaModel};
use crate::store::{LocalStore, Record, StoreMetadata};

/// Performs a mapped migration from a source store into a destination
/// store, given a resolved mapping model.
///
/// The source store is never written to; every record lands in the
/// destination store, which the caller then swaps into place. Record ids
/// are preserved, so relationship values survive by value copy.
pub struct MigrationManager;

impl MigrationManager {
    /// Run the migration pass.
    ///
    /// `on_progress` receives `(records done, records total)` after every
    /// migrated record; the final call reports `done == total`.
    pub fn migrate(
        source: &LocalStore,
        destination: &LocalStore,
        mapping: &MappingModel,
        source_model: &SchemaModel,
        destination_model: &SchemaModel,
        mut on_progress: impl FnMut(u64, u64),
    ) -> Result<(), Error> {
        let mut total = 0u64;
        for copy in &mapping.copies {
            total += source.count_records(&copy.source_entity)?;
        }
        for transform in &mapping.transforms {
            total += source.count_records(&transform.source_entity)?;
        }
        // Deleted entities are simply never read; inserted entities have no
        // source instances to populate.
        let total = total.max(1);
        let mut done = 0u64;

        for copy in &mapping.copies {
            for (id, record) in source.records(&copy.source_entity)? {
                let mut migrated = Record::new();
                for (source_name, destination_name) in
                    copy.attributes.iter().chain(copy.relationships.iter())
                {
                    if let Some(value) = record.get(source_name) {
                        migrated.set(destination_name.clone(), value.clone());
                    }
                }
                destination.insert_record(&copy.destination_entity, id, &migrated)?;
                done += 1;
                on_progress(done, total);
            }
        }

        for transform in &mapping.transforms {
            let source_entity = require_entity(source_model, &transform.source_entity)?;
            let destination_entity =
                require_entity(destination_model, &transform.destination_entity)?;

            for (id, record) in source.records(&transform.source_entity)? {
                let source_object = SourceObject::new(source_entity, id, &record);
                let mut destination_object = DestinationObject::new(destination_entity);

                match &transform.transformer {
                    Some(transformer) => transformer(&source_object, &mut destination_object)?,
                    None => {
                        destination_object.copy_matching_attributes(&source_object)?;
                    }
                }

                // A transformer that never instantiated the destination
                // drops the record.
                if let Some(migrated) = destination_object.into_record() {
                    destination.insert_record(&transform.destination_entity, id, &migrated)?;
                }
                done += 1;
                on_progress(done, total);
            }
        }

        destination.set_metadata(&StoreMetadata::for_model(destination_model))?;
        destination.flush()?;
        on_progress(total, total);
        Ok(())
    }
}

fn require_entity<'a>(model: &'a SchemaModel, name: &str) -> Result<&'a EntityDef, Error> {
    model.get_entity(name).ok_or_else(|| {
        Error::Internal(InternalError::Migration(format!(
            "mapping names entity {name:?}, absent from model {:?}",
            model.version
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::mapping::resolve_entity_mappings;
    use crate::schema::{AttributeDef, AttributeType, ScalarType};
    use crate::store::Value;
    use tempfile::tempdir;

    fn person() -> EntityDef {
        EntityDef::new("Person", "id")
            .with_attribute(AttributeDef::new(
                "id",
                AttributeType::scalar(ScalarType::Uuid),
            ))
            .with_attribute(AttributeDef::new(
                "name",
                AttributeType::scalar(ScalarType::String),
            ))
    }

    #[test]
    fn test_copy_pass_preserves_records() {
        let dir = tempdir().unwrap();
        let source = LocalStore::open(dir.path().join("source")).unwrap();
        let destination = LocalStore::open(dir.path().join("destination")).unwrap();

        let v1 = SchemaModel::new("v1").with_entity(person());
        let v2 = SchemaModel::new("v2").with_entity(person());

        let id = [9u8; 16];
        source
            .insert_record(
                "Person",
                id,
                &Record::new()
                    .with("id", Value::Uuid(id))
                    .with("name", Value::String("Ada".into())),
            )
            .unwrap();

        let mapping = resolve_entity_mappings(&[], &v1, &v2);
        let mut reports = Vec::new();
        MigrationManager::migrate(&source, &destination, &mapping, &v1, &v2, |done, total| {
            reports.push((done, total))
        })
        .unwrap();

        let migrated = destination.get_record("Person", id).unwrap().unwrap();
        assert_eq!(migrated.get("name"), Some(&Value::String("Ada".into())));
        assert_eq!(reports.last(), Some(&(1, 1)));

        let metadata = destination.metadata().unwrap().unwrap();
        assert_eq!(metadata.model_version, "v2");
    }

    #[test]
    fn test_default_transform_renames_attributes() {
        let dir = tempdir().unwrap();
        let source = LocalStore::open(dir.path().join("source")).unwrap();
        let destination = LocalStore::open(dir.path().join("destination")).unwrap();

        let v1 = SchemaModel::new("v1").with_entity(person());
        let v2 = SchemaModel::new("v2").with_entity(
            EntityDef::new("Person", "id")
                .with_attribute(AttributeDef::new(
                    "id",
                    AttributeType::scalar(ScalarType::Uuid),
                ))
                .with_attribute(
                    AttributeDef::new("full_name", AttributeType::scalar(ScalarType::String))
                        .with_renaming_id("name"),
                ),
        );

        let id = [4u8; 16];
        source
            .insert_record(
                "Person",
                id,
                &Record::new()
                    .with("id", Value::Uuid(id))
                    .with("name", Value::String("Grace".into())),
            )
            .unwrap();

        let mapping = resolve_entity_mappings(&[], &v1, &v2);
        assert_eq!(mapping.transforms.len(), 1);

        MigrationManager::migrate(&source, &destination, &mapping, &v1, &v2, |_, _| {}).unwrap();

        let migrated = destination.get_record("Person", id).unwrap().unwrap();
        assert_eq!(
            migrated.get("full_name"),
            Some(&Value::String("Grace".into()))
        );
        assert_eq!(migrated.get("name"), None);
    }

    #[test]
    fn test_transformer_error_aborts_pass() {
        let dir = tempdir().unwrap();
        let source = LocalStore::open(dir.path().join("source")).unwrap();
        let destination = LocalStore::open(dir.path().join("destination")).unwrap();

        let v1 = SchemaModel::new("v1").with_entity(person());
        let v2 = SchemaModel::new("v2").with_entity(
            person().with_attribute(AttributeDef::optional("email", ScalarType::String)),
        );

        source
            .insert_record("Person", [1u8; 16], &Record::new())
            .unwrap();

        let explicit = [crate::migrate::EntityMapping::transform_entity(
            "Person",
            "Person",
            |_, _| Err(Error::User("refused".into())),
        )];
        let mapping = resolve_entity_mappings(&explicit, &v1, &v2);

        let err =
            MigrationManager::migrate(&source, &destination, &mapping, &v1, &v2, |_, _| {})
                .unwrap_err();
        assert_eq!(err.code(), 6);
    }
}
