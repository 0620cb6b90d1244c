//! Migration path planning.
//!
//! The planner walks the schema history's migration chain from a store's
//! persisted version to the stack's current version, materializing one
//! step per hop. Planning touches no files and is idempotent: recomputing
//! against an unchanged store and history yields the same step sequence.

use super::mapping::MappingModel;
use super::provider::{find_mapping, MappingProvider};
use crate::error::Error;
use crate::schema::{SchemaHistory, SchemaModel};
use crate::store::{LocalStorage, StoreMetadata};
use std::fmt;
use std::sync::Arc;

/// The kind of migration performed for one hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationKind {
    /// No migration was necessary.
    None,
    /// In-place migration inferred from structural analysis.
    Lightweight {
        /// Source version.
        from: String,
        /// Destination version.
        to: String,
    },
    /// Mapped migration through a temporary store.
    Heavyweight {
        /// Source version.
        from: String,
        /// Destination version.
        to: String,
    },
}

impl MigrationKind {
    /// Check if this is a lightweight migration.
    pub fn is_lightweight(&self) -> bool {
        matches!(self, MigrationKind::Lightweight { .. })
    }

    /// Check if this is a heavyweight migration.
    pub fn is_heavyweight(&self) -> bool {
        matches!(self, MigrationKind::Heavyweight { .. })
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationKind::None => write!(f, "none"),
            MigrationKind::Lightweight { from, to } => {
                write!(f, "lightweight {from} -> {to}")
            }
            MigrationKind::Heavyweight { from, to } => {
                write!(f, "heavyweight {from} -> {to}")
            }
        }
    }
}

/// One hop of a migration plan.
///
/// Constructed by the planner, consumed once by the executor.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    /// The model the store currently conforms to.
    pub source_model: SchemaModel,
    /// The model the store will conform to after this step.
    pub destination_model: SchemaModel,
    /// The resolved entity mapping model for the hop.
    pub mapping: MappingModel,
    /// How the hop will be performed.
    pub kind: MigrationKind,
}

/// An ordered sequence of migration steps.
///
/// An empty plan means the store already matches the current model.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    /// The steps, in version-chain order.
    pub steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    /// Check if no migration is needed.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// The migration kinds of every step, in order.
    pub fn kinds(&self) -> Vec<MigrationKind> {
        self.steps.iter().map(|s| s.kind.clone()).collect()
    }
}

/// Compute the migration plan for a store persisted with `metadata`.
///
/// Returns an empty plan when the store is already schema-compatible with
/// the history's current model. Fails with
/// [`Error::MappingModelNotFound`] when the persisted version is not
/// registered or the chain ends before reaching the current version, and
/// with [`Error::ProgressiveMigrationRequired`] when the plan needs more
/// than one hop but the storage disallows progressive migration.
pub fn compute_migration_plan(
    history: &SchemaHistory,
    providers: &[Arc<dyn MappingProvider>],
    storage: &LocalStorage,
    metadata: &StoreMetadata,
) -> Result<MigrationPlan, Error> {
    if history.current_model().is_compatible_with(metadata) {
        return Ok(MigrationPlan::default());
    }

    let mut from = metadata.model_version.clone();
    if !history.contains_version(&from) {
        return Err(Error::MappingModelNotFound {
            path: storage.path.clone(),
            from,
        });
    }

    let mut steps = Vec::new();
    while from != history.current_version() {
        let Some(next) = history.next_version_after(&from) else {
            // Chain ends before reaching the current model.
            return Err(Error::MappingModelNotFound {
                path: storage.path.clone(),
                from,
            });
        };
        let next = next.to_string();

        let (Some(source_model), Some(destination_model)) =
            (history.model(&from), history.model(&next))
        else {
            return Err(Error::MappingModelNotFound {
                path: storage.path.clone(),
                from,
            });
        };

        let (mapping, kind) = find_mapping(providers, source_model, destination_model)?;
        steps.push(MigrationStep {
            source_model: source_model.clone(),
            destination_model: destination_model.clone(),
            mapping,
            kind,
        });

        from = next;
    }

    debug_assert!(
        steps
            .last()
            .is_some_and(|s| s.destination_model.structurally_equal(history.current_model())),
        "the final step must land on the current model"
    );

    if steps.len() > 1 && storage.prevent_progressive_migration {
        return Err(Error::ProgressiveMigrationRequired {
            path: storage.path.clone(),
        });
    }

    Ok(MigrationPlan { steps })
}
