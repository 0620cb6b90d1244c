//! Migration execution.
//!
//! Steps run strictly in plan order on one worker thread; each step's
//! input is the previous step's on-disk output. A failed step sets a
//! shared cancelled flag so later steps complete as no-ops, and the first
//! failure is the one reported.

use super::manager::MigrationManager;
use super::plan::{MigrationKind, MigrationPlan, MigrationStep};
use super::progress::{FakeProgressTicker, MigrationProgress, STEP_UNITS};
use crate::error::Error;
use crate::store::{replace_store, LocalStorage, LocalStore, StoreMetadata};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Outcome of a lightweight attempt that did not finish the step.
enum LightweightOutcome {
    /// The step is done.
    Done,
    /// Nothing was mutated; the mapped path takes over.
    Fallback(String),
}

/// Handle to a migration running on its worker thread.
pub struct MigrationHandle {
    progress: MigrationProgress,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MigrationHandle {
    /// The live progress tree for UI binding.
    pub fn progress(&self) -> MigrationProgress {
        self.progress.clone()
    }

    /// Block until the migration worker finishes.
    pub fn wait(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

/// Executes migration plans.
pub struct MigrationExecutor;

impl MigrationExecutor {
    /// Execute a plan on a dedicated worker thread.
    ///
    /// `completion` is invoked exactly once, with either the kinds of every
    /// performed step or the first failure.
    pub fn start<F>(storage: LocalStorage, plan: MigrationPlan, completion: F) -> MigrationHandle
    where
        F: FnOnce(Result<Vec<MigrationKind>, Error>) + Send + 'static,
    {
        let progress = MigrationProgress::new(plan.len());
        let worker_progress = progress.clone();

        let worker = thread::spawn(move || {
            let result = Self::execute_blocking(&storage, &plan, &worker_progress);
            completion(result);
        });

        MigrationHandle {
            progress,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Execute a plan on the calling thread.
    ///
    /// `progress` must have been created with the plan's step count.
    pub fn execute_blocking(
        storage: &LocalStorage,
        plan: &MigrationPlan,
        progress: &MigrationProgress,
    ) -> Result<Vec<MigrationKind>, Error> {
        debug_assert_eq!(progress.step_count(), plan.len());

        let cancelled = AtomicBool::new(false);
        let mut first_error: Option<Error> = None;
        let mut performed = Vec::with_capacity(plan.len());

        for (index, step) in plan.steps.iter().enumerate() {
            if cancelled.load(Ordering::SeqCst) {
                // A prior step failed; this one completes as a no-op.
                continue;
            }

            info!(step = index, kind = %step.kind, "running migration step");
            match Self::execute_step(storage, step, progress, index) {
                Ok(()) => performed.push(step.kind.clone()),
                Err(e) => {
                    warn!(step = index, error = %e, "migration step failed");
                    cancelled.store(true, Ordering::SeqCst);
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(steps = performed.len(), "migration complete");
                Ok(performed)
            }
        }
    }

    fn execute_step(
        storage: &LocalStorage,
        step: &MigrationStep,
        progress: &MigrationProgress,
        index: usize,
    ) -> Result<(), Error> {
        // Finalize in-flight writes on the source representation before
        // anything reads it.
        {
            let store = LocalStore::open_existing(&storage.path)?;
            store.flush()?;
        }

        if step.kind.is_lightweight() {
            let ticker = FakeProgressTicker::start(progress.clone(), index);
            match Self::try_lightweight(storage, step) {
                Ok(LightweightOutcome::Done) => {
                    ticker.finish(true);
                    return Ok(());
                }
                Ok(LightweightOutcome::Fallback(reason)) => {
                    ticker.finish(false);
                    debug!(
                        step = index,
                        reason = %reason,
                        "lightweight migration declined; falling back to mapped migration"
                    );
                }
                Err(e) => {
                    // The in-place pass mutated the store before failing;
                    // falling back now would read a half-migrated source.
                    ticker.finish(false);
                    return Err(e);
                }
            }
        }

        Self::run_mapped(storage, step, progress, index)?;
        progress.step(index).complete();
        Ok(())
    }

    /// Attempt the in-place lightweight pass.
    ///
    /// Everything that can disqualify the store is checked before the first
    /// mutation; a disqualified attempt returns `Fallback` with the store
    /// untouched. Once mutation starts, failures are fatal for the step.
    fn try_lightweight(
        storage: &LocalStorage,
        step: &MigrationStep,
    ) -> Result<LightweightOutcome, Error> {
        if step.mapping.has_transforms() {
            return Ok(LightweightOutcome::Fallback(
                "mapping requires per-record transforms".into(),
            ));
        }

        let store = match LocalStore::open_existing(&storage.path) {
            Ok(store) => store,
            Err(e) => return Ok(LightweightOutcome::Fallback(e.to_string())),
        };
        let Some(metadata) = store.metadata()? else {
            return Ok(LightweightOutcome::Fallback(
                "store carries no schema metadata".into(),
            ));
        };
        if metadata.model_version != step.source_model.version {
            return Ok(LightweightOutcome::Fallback(format!(
                "store is at version {:?}, step expects {:?}",
                metadata.model_version, step.source_model.version
            )));
        }

        // An in-place rename landing on another entity's current name would
        // merge the two record sets.
        let source_names: HashSet<&str> = step
            .mapping
            .copies
            .iter()
            .map(|c| c.source_entity.as_str())
            .collect();
        for copy in &step.mapping.copies {
            if copy.destination_entity != copy.source_entity
                && source_names.contains(copy.destination_entity.as_str())
            {
                return Ok(LightweightOutcome::Fallback(format!(
                    "rename {:?} -> {:?} collides with a live entity",
                    copy.source_entity, copy.destination_entity
                )));
            }
        }

        // Mutation phase. Deletes and renames are idempotent, so a crash
        // before the metadata stamp re-runs this pass cleanly.
        for delete in &step.mapping.deletes {
            store.remove_all_records(&delete.source_entity)?;
        }
        for copy in &step.mapping.copies {
            if copy.source_entity != copy.destination_entity {
                store.rename_entity_records(&copy.source_entity, &copy.destination_entity)?;
            }
        }
        store.set_metadata(&StoreMetadata::for_model(&step.destination_model))?;
        store.flush()?;
        Ok(LightweightOutcome::Done)
    }

    /// The mapped path: migrate into a temporary store, then atomically
    /// swap it into place.
    ///
    /// The temporary directory is owned for the duration of the step and
    /// cleaned up on both success and failure.
    fn run_mapped(
        storage: &LocalStorage,
        step: &MigrationStep,
        progress: &MigrationProgress,
        index: usize,
    ) -> Result<(), Error> {
        let step_progress = progress.step(index);
        let base = step_progress.completed_units();
        let span = STEP_UNITS - base;

        let parent = storage.path.parent().unwrap_or_else(|| Path::new("."));
        let temp = tempfile::Builder::new()
            .prefix(".strata-migration")
            .tempdir_in(parent)?;
        let migrated_path = temp.path().join("store");

        {
            let source = LocalStore::open_existing(&storage.path)?;
            let destination = LocalStore::open(&migrated_path)?;
            MigrationManager::migrate(
                &source,
                &destination,
                &step.mapping,
                &step.source_model,
                &step.destination_model,
                |done, total| {
                    step_progress.advance_to(base + span * done / total.max(1));
                },
            )?;
            // Both stores close here; the swap below renames their
            // directories.
        }

        replace_store(&storage.path, &migrated_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::plan::compute_migration_plan;
    use crate::schema::{
        AttributeDef, AttributeType, EntityDef, MigrationChain, ScalarType, SchemaHistory,
        SchemaModel,
    };
    use crate::store::{Record, Value};
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

    fn seed_store(path: &Path, model: &SchemaModel, records: &[([u8; 16], Record)]) {
        let store = LocalStore::open(path).unwrap();
        for (id, record) in records {
            let entity = model.entity_names()[0].to_string();
            store.insert_record(&entity, *id, record).unwrap();
        }
        store
            .set_metadata(&StoreMetadata::for_model(model))
            .unwrap();
        store.flush().unwrap();
    }

    #[test]
    fn test_lightweight_rename_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let v1 = SchemaModel::new("v1").with_entity(person());
        let v2 = SchemaModel::new("v2").with_entity(EntityDef {
            name: "Human".into(),
            renaming_id: Some("Person".into()),
            ..person()
        });
        let history = SchemaHistory::new(
            [v1.clone(), v2],
            "v2",
            MigrationChain::linear(["v1", "v2"]),
        );

        let record = Record::new().with("name", Value::String("Ada".into()));
        seed_store(&path, &v1, &[([1u8; 16], record.clone())]);

        let storage = LocalStorage::new(&path);
        let store = LocalStore::open(&path).unwrap();
        let metadata = store.metadata().unwrap().unwrap();
        drop(store);

        let plan = compute_migration_plan(&history, &[], &storage, &metadata).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.steps[0].kind.is_lightweight());

        let progress = MigrationProgress::new(plan.len());
        let kinds = MigrationExecutor::execute_blocking(&storage, &plan, &progress).unwrap();
        assert_eq!(kinds.len(), 1);
        assert!(progress.is_complete());

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.records("Person").unwrap().len(), 0);
        let humans = store.records("Human").unwrap();
        assert_eq!(humans.len(), 1);
        assert_eq!(humans[0].1, record);
        assert_eq!(store.metadata().unwrap().unwrap().model_version, "v2");
    }

    #[test]
    fn test_mapped_step_failure_leaves_original_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let v1 = SchemaModel::new("v1").with_entity(person());
        let v2 = SchemaModel::new("v2").with_entity(
            person().with_attribute(AttributeDef::optional("email", ScalarType::String)),
        );
        let history = SchemaHistory::new(
            [v1.clone(), v2],
            "v2",
            MigrationChain::linear(["v1", "v2"]),
        );

        let record = Record::new().with("name", Value::String("Ada".into()));
        seed_store(&path, &v1, &[([1u8; 16], record.clone())]);

        let failing: std::sync::Arc<dyn crate::migrate::MappingProvider> =
            std::sync::Arc::new(crate::migrate::CustomMappingProvider::new(
                "v1",
                "v2",
                vec![crate::migrate::EntityMapping::transform_entity(
                    "Person",
                    "Person",
                    |_, _| Err(Error::User("refused".into())),
                )],
            ));

        let storage = LocalStorage::new(&path);
        let store = LocalStore::open(&path).unwrap();
        let metadata = store.metadata().unwrap().unwrap();
        drop(store);

        let plan =
            compute_migration_plan(&history, std::slice::from_ref(&failing), &storage, &metadata)
                .unwrap();
        let progress = MigrationProgress::new(plan.len());
        let err = MigrationExecutor::execute_blocking(&storage, &plan, &progress).unwrap_err();
        assert_eq!(err.code(), 6);

        // The original store is untouched and no temp artifacts remain.
        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.metadata().unwrap().unwrap().model_version, "v1");
        assert_eq!(store.records("Person").unwrap().len(), 1);
        drop(store);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".strata-migration"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_start_invokes_completion_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let v1 = SchemaModel::new("v1").with_entity(person());
        let v2 = SchemaModel::new("v2").with_entity(EntityDef {
            name: "Human".into(),
            renaming_id: Some("Person".into()),
            ..person()
        });
        let history = SchemaHistory::new(
            [v1.clone(), v2],
            "v2",
            MigrationChain::linear(["v1", "v2"]),
        );

        seed_store(&path, &v1, &[([1u8; 16], Record::new())]);

        let storage = LocalStorage::new(&path);
        let store = LocalStore::open(&path).unwrap();
        let metadata = store.metadata().unwrap().unwrap();
        drop(store);

        let plan = compute_migration_plan(&history, &[], &storage, &metadata).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let handle = MigrationExecutor::start(storage, plan, move |result| {
            tx.send(result).unwrap();
        });
        handle.wait();

        let result = rx.recv().unwrap();
        let kinds = result.unwrap();
        assert_eq!(kinds.len(), 1);
        assert!(kinds[0].is_lightweight());
        assert!(handle.progress().is_complete());
        // Exactly once: the channel holds no further message.
        assert!(rx.try_recv().is_err());
    }
}
