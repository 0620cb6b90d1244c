//! Integration tests for the progressive migration engine.

use std::path::PathBuf;
use std::sync::Arc;

use strata_core::{
    AttributeDef, AttributeType, CustomMappingProvider, Database, EntityMapping, LocalStorage,
    LocalStore, MappingProvider, MigrationChain, EntityDef, Record, ScalarType, SchemaHistory,
    SchemaModel, StoreMetadata, Value,
};

struct TestContext {
    storage: LocalStorage,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("store"));
        Self { storage, _dir: dir }
    }

    fn path(&self) -> PathBuf {
        self.storage.path.clone()
    }

    fn seed(&self, model: &SchemaModel, entity: &str, records: &[([u8; 16], Record)]) {
        let store = LocalStore::open(&self.path()).unwrap();
        for (id, record) in records {
            store.insert_record(entity, *id, record).unwrap();
        }
        store
            .set_metadata(&StoreMetadata::for_model(model))
            .unwrap();
        store.flush().unwrap();
    }
}

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

fn renamed(entity: EntityDef, name: &str, identity: &str) -> EntityDef {
    EntityDef {
        name: name.into(),
        renaming_id: Some(identity.into()),
        ..entity
    }
}

/// v1 -> v2 -> v3 where each hop only renames the entity: every hop is
/// lightweight.
fn rename_only_history() -> SchemaHistory {
    let v1 = SchemaModel::new("v1").with_entity(person());
    let v2 = SchemaModel::new("v2").with_entity(renamed(person(), "Human", "Person"));
    let v3 = SchemaModel::new("v3").with_entity(renamed(person(), "Being", "Person"));
    SchemaHistory::new(
        [v1, v2, v3],
        "v3",
        MigrationChain::linear(["v1", "v2", "v3"]),
    )
}

/// v1 -> v2 -> v3 where the second hop adds an attribute: the first hop is
/// lightweight, the second heavyweight.
fn mixed_history() -> SchemaHistory {
    let v1 = SchemaModel::new("v1").with_entity(person());
    let v2 = SchemaModel::new("v2").with_entity(renamed(person(), "Human", "Person"));
    let v3 = SchemaModel::new("v3").with_entity(renamed(
        person().with_attribute(
            AttributeDef::optional("email", ScalarType::String)
                .with_default(Value::String(String::new())),
        ),
        "Human",
        "Person",
    ));
    SchemaHistory::new(
        [v1, v2, v3],
        "v3",
        MigrationChain::linear(["v1", "v2", "v3"]),
    )
}

// ============== Tests ==============

#[test]
fn test_two_step_plan_both_lightweight() {
    let ctx = TestContext::new();
    let history = rename_only_history();
    let v1 = history.model("v1").unwrap().clone();
    ctx.seed(&v1, "Person", &[([1u8; 16], Record::new())]);

    let db = Database::new(history);
    let kinds = db.required_migrations(&ctx.storage).unwrap();

    assert_eq!(kinds.len(), 2);
    assert!(kinds.iter().all(|k| k.is_lightweight()));
}

#[test]
fn test_two_step_plan_mixed_kinds() {
    let ctx = TestContext::new();
    let history = mixed_history();
    let v1 = history.model("v1").unwrap().clone();
    ctx.seed(&v1, "Person", &[([1u8; 16], Record::new())]);

    let db = Database::new(history);
    let kinds = db.required_migrations(&ctx.storage).unwrap();

    assert_eq!(kinds.len(), 2);
    assert!(kinds[0].is_lightweight());
    assert!(kinds[1].is_heavyweight());
}

#[test]
fn test_progressive_migration_disallowed() {
    let ctx = TestContext::new();
    let history = rename_only_history();
    let v1 = history.model("v1").unwrap().clone();
    ctx.seed(&v1, "Person", &[([1u8; 16], Record::new())]);

    let storage = ctx.storage.clone().with_progressive_migration_disabled();
    let db = Database::new(history);

    let err = db.required_migrations(&storage).unwrap_err();
    assert_eq!(err.code(), 4);
}

#[test]
fn test_progressive_migration_end_to_end() {
    let ctx = TestContext::new();
    let history = mixed_history();
    let v1 = history.model("v1").unwrap().clone();

    let record = Record::new()
        .with("id", Value::Uuid([7u8; 16]))
        .with("name", Value::String("Ada".into()));
    ctx.seed(&v1, "Person", &[([7u8; 16], record)]);

    let db = Database::new(history);
    let attached = db.attach_storage(&ctx.storage).unwrap();

    // Records survived both hops under the final entity name, with the new
    // attribute defaulted.
    let store = attached.store();
    assert_eq!(store.records("Person").unwrap().len(), 0);
    let humans = store.records("Human").unwrap();
    assert_eq!(humans.len(), 1);
    assert_eq!(humans[0].1.get("name"), Some(&Value::String("Ada".into())));
    assert_eq!(
        humans[0].1.get("email"),
        Some(&Value::String(String::new()))
    );

    let metadata = store.metadata().unwrap().unwrap();
    assert_eq!(metadata.model_version, "v3");

    // Idempotent: re-planning against the migrated store finds nothing to
    // do.
    assert!(db.required_migrations(&ctx.storage).unwrap().is_empty());
}

#[test]
fn test_custom_transform_with_inferred_rename() {
    // One explicit transform plus a renamed entity sharing a renaming
    // identity: the transform runs and the rename is carried as a copy.
    let ctx = TestContext::new();

    let pet = EntityDef::new("Pet", "id")
        .with_attribute(AttributeDef::new(
            "id",
            AttributeType::scalar(ScalarType::Uuid),
        ))
        .with_attribute(AttributeDef::new(
            "nickname",
            AttributeType::scalar(ScalarType::String),
        ));

    let v1 = SchemaModel::new("v1").with_entity(person()).with_entity(pet.clone());
    let v2 = SchemaModel::new("v2")
        .with_entity(
            person().with_attribute(AttributeDef::optional("display_name", ScalarType::String)),
        )
        .with_entity(renamed(pet, "Animal", "Pet"));
    let history = SchemaHistory::new(
        [v1.clone(), v2],
        "v2",
        MigrationChain::linear(["v1", "v2"]),
    );

    let person_record = Record::new()
        .with("id", Value::Uuid([1u8; 16]))
        .with("name", Value::String("Grace".into()));
    let pet_record = Record::new()
        .with("id", Value::Uuid([2u8; 16]))
        .with("nickname", Value::String("Rex".into()));
    {
        let store = LocalStore::open(ctx.path()).unwrap();
        store
            .insert_record("Person", [1u8; 16], &person_record)
            .unwrap();
        store.insert_record("Pet", [2u8; 16], &pet_record).unwrap();
        store
            .set_metadata(&StoreMetadata::for_model(&v1))
            .unwrap();
        store.flush().unwrap();
    }

    let provider: Arc<dyn MappingProvider> = Arc::new(CustomMappingProvider::new(
        "v1",
        "v2",
        vec![EntityMapping::transform_entity(
            "Person",
            "Person",
            |source, destination| {
                destination.copy_matching_attributes(source)?;
                let name = source
                    .value("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                destination.set("display_name", Value::String(name.to_uppercase()))
            },
        )],
    ));

    let db = Database::new(history).with_mapping_provider(provider);
    let attached = db.attach_storage(&ctx.storage).unwrap();
    let store = attached.store();

    let people = store.records("Person").unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(
        people[0].1.get("display_name"),
        Some(&Value::String("GRACE".into()))
    );

    let animals = store.records("Animal").unwrap();
    assert_eq!(animals.len(), 1);
    assert_eq!(
        animals[0].1.get("nickname"),
        Some(&Value::String("Rex".into()))
    );
    assert!(store.records("Pet").unwrap().is_empty());
}

#[test]
fn test_failed_step_keeps_last_committed_version() {
    // Step 1 (v1 -> v2) succeeds; step 2 (v2 -> v3) fails. The store must
    // be left at v2, and re-planning resumes from there.
    let ctx = TestContext::new();
    let history = mixed_history();
    let v1 = history.model("v1").unwrap().clone();
    ctx.seed(&v1, "Person", &[([1u8; 16], Record::new())]);

    let failing: Arc<dyn MappingProvider> = Arc::new(CustomMappingProvider::new(
        "v2",
        "v3",
        vec![EntityMapping::transform_entity(
            "Human",
            "Human",
            |_, _| Err(strata_core::Error::User("refused".into())),
        )],
    ));

    let db = Database::new(history).with_mapping_provider(failing);
    let err = db.attach_storage(&ctx.storage).unwrap_err();
    assert_eq!(err.code(), 6);

    let store = LocalStore::open(ctx.path()).unwrap();
    assert_eq!(store.metadata().unwrap().unwrap().model_version, "v2");
    assert_eq!(store.records("Human").unwrap().len(), 1);
    drop(store);

    // Re-planning starts from the committed v2, a single remaining hop.
    let history = mixed_history();
    let db = Database::new(history);
    let kinds = db.required_migrations(&ctx.storage).unwrap();
    assert_eq!(kinds.len(), 1);
}

#[test]
fn test_worker_migration_reports_monotone_progress() {
    let ctx = TestContext::new();
    let history = mixed_history();
    let v1 = history.model("v1").unwrap().clone();

    let records: Vec<_> = (0..50u8)
        .map(|n| {
            (
                [n; 16],
                Record::new()
                    .with("id", Value::Uuid([n; 16]))
                    .with("name", Value::String(format!("person-{n}"))),
            )
        })
        .collect();
    ctx.seed(&v1, "Person", &records);

    let db = Database::new(history);
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = db
        .upgrade_if_needed(ctx.storage.clone(), move |result| {
            tx.send(result).unwrap();
        })
        .unwrap()
        .expect("a migration is required");

    let progress = handle.progress();
    let mut samples = Vec::new();
    let result = loop {
        match rx.try_recv() {
            Ok(result) => break result,
            Err(_) => {
                samples.push(progress.fraction_completed());
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
    };
    handle.wait();
    samples.push(progress.fraction_completed());

    let kinds = result.unwrap();
    assert_eq!(kinds.len(), 2);
    assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*samples.last().unwrap(), 1.0);
    assert!(progress.is_complete());

    let store = LocalStore::open(ctx.path()).unwrap();
    assert_eq!(store.metadata().unwrap().unwrap().model_version, "v3");
    assert_eq!(store.records("Human").unwrap().len(), 50);
}
