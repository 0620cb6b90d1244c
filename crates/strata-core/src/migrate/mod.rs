//! Progressive schema migration engine.
//!
//! This module turns a store persisted under an old schema version into one
//! matching the current version:
//! - Mapping resolution reconciles caller-declared entity mappings with
//!   structural inference ([`mapping`]).
//! - Providers materialize a mapping model per version hop ([`provider`]).
//! - The planner walks the migration chain into an ordered step list
//!   ([`plan`]).
//! - The executor runs each step, attempting a lightweight in-place pass
//!   before falling back to a mapped copy with crash-safe atomic replacement
//!   ([`executor`]), reporting through a hierarchical progress tree
//!   ([`progress`]).

pub mod executor;
pub mod manager;
pub mod mapping;
pub mod plan;
pub mod progress;
pub mod provider;

pub use executor::{MigrationExecutor, MigrationHandle};
pub use manager::MigrationManager;
pub use mapping::{
    resolve_entity_mappings, DestinationObject, EntityMapping, MappingModel, SourceObject,
    Transformer,
};
pub use plan::{compute_migration_plan, MigrationKind, MigrationPlan, MigrationStep};
pub use progress::{MigrationProgress, StepProgress};
pub use provider::{find_mapping, CustomMappingProvider, InferredMappingProvider, MappingProvider};
