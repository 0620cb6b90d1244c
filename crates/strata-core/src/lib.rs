//! Strata Core - typed persistence with progressive schema migration.
//!
//! This crate provides a versioned schema catalog over an embedded store,
//! typed fetch and transaction surfaces, a diffable list-snapshot structure
//! for incremental presentation, and a progressive migration engine that
//! upgrades a store across schema versions with lightweight/mapped
//! fallback, crash-safe store replacement, and live progress reporting.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod database;
pub mod error;
pub mod migrate;
pub mod query;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod txn;

pub use database::{AttachedStore, Database};
pub use error::{Error, InternalError, ERROR_DOMAIN};
pub use migrate::{
    CustomMappingProvider, EntityMapping, InferredMappingProvider, MappingModel, MappingProvider,
    MigrationExecutor, MigrationHandle, MigrationKind, MigrationPlan, MigrationProgress,
};
pub use query::{FetchRequest, FetchedObject, Filter, SortDirection, SortOrder};
pub use schema::{
    AttributeDef, AttributeType, EntityDef, MigrationChain, RelationshipDef, ScalarType,
    SchemaHistory, SchemaModel,
};
pub use snapshot::{DiffableSnapshot, ItemId, SnapshotItem, SnapshotSection};
pub use store::{LocalStorage, LocalStore, Record, StoreMetadata, Value};
pub use txn::Transaction;
