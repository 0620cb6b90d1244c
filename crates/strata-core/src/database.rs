//! Database coordinator - the caller-facing entry point.
//!
//! A [`Database`] owns the schema history and mapping providers and
//! mediates every storage attach: it plans migrations, runs them (blocking
//! or on a worker), and opens the migrated store for fetches and
//! transactions.

use crate::error::Error;
use crate::migrate::{
    compute_migration_plan, MappingProvider, MigrationExecutor, MigrationHandle, MigrationKind,
    MigrationPlan, MigrationProgress,
};
use crate::query::{section_key, FetchRequest, FetchedObject};
use crate::schema::{SchemaHistory, SchemaModel};
use crate::snapshot::{DiffableSnapshot, ItemId};
use crate::store::{LocalStorage, LocalStore, StoreMetadata};
use crate::txn::Transaction;
use std::sync::Arc;
use tracing::info;

/// The top-level coordinator.
///
/// Explicitly constructed and explicitly passed; there is no hidden global
/// instance.
pub struct Database {
    history: SchemaHistory,
    providers: Vec<Arc<dyn MappingProvider>>,
}

impl Database {
    /// Create a database configured for the given schema history.
    pub fn new(history: SchemaHistory) -> Self {
        Self {
            history,
            providers: Vec::new(),
        }
    }

    /// Register a mapping provider. Providers are consulted in
    /// registration order; structural inference remains the fallback.
    pub fn with_mapping_provider(mut self, provider: Arc<dyn MappingProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// The configured schema history.
    pub fn history(&self) -> &SchemaHistory {
        &self.history
    }

    fn plan_for(&self, storage: &LocalStorage) -> Result<MigrationPlan, Error> {
        if !storage.exists() {
            // Nothing on disk yet; attaching will create a fresh store.
            return Ok(MigrationPlan::default());
        }
        let metadata = {
            let store = LocalStore::open(&storage.path)?;
            store.metadata()?
        };
        let Some(metadata) = metadata else {
            // A store that was created but never stamped adopts the
            // current model on attach.
            return Ok(MigrationPlan::default());
        };
        compute_migration_plan(&self.history, &self.providers, storage, &metadata)
    }

    /// Dry-run: the migrations that attaching this storage would perform.
    ///
    /// Returns an empty list when the store is missing, fresh, or already
    /// current.
    pub fn required_migrations(&self, storage: &LocalStorage) -> Result<Vec<MigrationKind>, Error> {
        Ok(self.plan_for(storage)?.kinds())
    }

    /// Migrate the storage on a worker thread if it needs it.
    ///
    /// Returns `Ok(None)` immediately when no migration is needed (the
    /// completion fires at once with an empty list); planning failures are
    /// returned synchronously without invoking the completion. Otherwise
    /// the returned handle exposes live progress, and `completion` fires
    /// exactly once when every step finishes or the first one fails.
    pub fn upgrade_if_needed<F>(
        &self,
        storage: LocalStorage,
        completion: F,
    ) -> Result<Option<MigrationHandle>, Error>
    where
        F: FnOnce(Result<Vec<MigrationKind>, Error>) + Send + 'static,
    {
        let plan = self.plan_for(&storage)?;
        if plan.is_empty() {
            completion(Ok(Vec::new()));
            return Ok(None);
        }
        info!(steps = plan.len(), path = %storage.path.display(), "starting migration");
        Ok(Some(MigrationExecutor::start(storage, plan, completion)))
    }

    /// Attach a storage, blocking through any required migration.
    pub fn attach_storage(&self, storage: &LocalStorage) -> Result<AttachedStore, Error> {
        let plan = self.plan_for(storage)?;
        if !plan.is_empty() {
            info!(steps = plan.len(), path = %storage.path.display(), "migrating before attach");
            let progress = MigrationProgress::new(plan.len());
            MigrationExecutor::execute_blocking(storage, &plan, &progress)?;
        }

        let store = LocalStore::open(&storage.path)?;
        let current = self.history.current_model();
        if store.metadata()?.is_none() {
            store.set_metadata(&StoreMetadata::for_model(current))?;
            store.flush()?;
        }

        Ok(AttachedStore {
            store,
            model: current.clone(),
        })
    }
}

/// An open, schema-current store ready for fetches and transactions.
#[derive(Debug)]
pub struct AttachedStore {
    store: LocalStore,
    model: SchemaModel,
}

impl AttachedStore {
    /// The model this store conforms to.
    pub fn model(&self) -> &SchemaModel {
        &self.model
    }

    /// The underlying store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Begin a transaction against this store.
    pub fn begin_transaction(&self) -> Transaction<'_> {
        Transaction::new(&self.store, &self.model)
    }

    /// Execute a fetch request.
    pub fn fetch(&self, request: &FetchRequest) -> Result<Vec<FetchedObject>, Error> {
        let records = self.filtered_sorted_records(request)?;
        let objects = records
            .into_iter()
            .skip(request.offset)
            .take(request.limit.unwrap_or(usize::MAX))
            .map(|(id, record)| FetchedObject { id, record })
            .collect();
        Ok(objects)
    }

    /// Execute a fetch request, sectioning results by one attribute's
    /// rendered value and presenting them as a diffable snapshot.
    ///
    /// The request's offset/limit window is applied during snapshot
    /// construction, across the flattened item sequence.
    pub fn fetch_sectioned(
        &self,
        request: &FetchRequest,
        section_attribute: &str,
    ) -> Result<DiffableSnapshot, Error> {
        let records = self.filtered_sorted_records(request)?;

        let mut sections: Vec<(String, Vec<ItemId>)> = Vec::new();
        for (id, record) in records {
            let key = section_key(record.get(section_attribute));
            match sections.last_mut() {
                Some((current, items)) if *current == key => items.push(ItemId(id)),
                _ => sections.push((key, vec![ItemId(id)])),
            }
        }

        Ok(DiffableSnapshot::from_sections(
            sections,
            request.offset,
            request.limit,
        ))
    }

    fn filtered_sorted_records(
        &self,
        request: &FetchRequest,
    ) -> Result<Vec<([u8; 16], crate::store::Record)>, Error> {
        if self.model.get_entity(&request.entity).is_none() {
            return Err(Error::User(format!(
                "unknown entity {:?}",
                request.entity
            )));
        }
        let mut records = self.store.records(&request.entity)?;
        if let Some(filter) = &request.filter {
            records.retain(|(_, record)| filter.matches(record));
        }
        request.sort_records(&mut records);
        Ok(records)
    }
}
