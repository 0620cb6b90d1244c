//! Core error types.
//!
//! The crate-level [`Error`] carries a closed set of stable error codes.
//! Callers that persist or transmit failures rely on [`Error::code`] and
//! [`ERROR_DOMAIN`] staying fixed across releases.

use std::path::PathBuf;
use thiserror::Error;

/// Stable error domain identifier.
pub const ERROR_DOMAIN: &str = "StrataErrorDomain";

/// Crate-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A failure whose cause could not be determined.
    #[error("unknown error")]
    Unknown,

    /// The target path is occupied by something that is not a strata store.
    #[error("a different storage already exists at {path:?}")]
    DifferentStorageExistsAtUrl {
        /// Path of the conflicting storage.
        path: PathBuf,
    },

    /// No mapping model could be resolved for a hop in the migration chain.
    #[error("no mapping model found from version {from:?} for storage at {path:?}")]
    MappingModelNotFound {
        /// Path of the storage being migrated.
        path: PathBuf,
        /// The source version the chain could not continue from.
        from: String,
    },

    /// The plan needs more than one hop but the storage disallows it.
    #[error("progressive migration required for storage at {path:?}")]
    ProgressiveMigrationRequired {
        /// Path of the storage being migrated.
        path: PathBuf,
    },

    /// An underlying store, encoding, or file-system failure.
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),

    /// A caller-supplied transformer or request failed.
    #[error("user error: {0}")]
    User(String),

    /// The transaction or operation was cancelled by the caller.
    #[error("user cancelled")]
    UserCancelled,

    /// The storage was expected to exist but does not.
    #[error("persistent store not found at {path:?}")]
    PersistentStoreNotFound {
        /// Path that was expected to hold a store.
        path: PathBuf,
    },
}

/// Underlying failures wrapped by [`Error::Internal`].
///
/// The original error chain is preserved through `source()` for diagnostics.
#[derive(Debug, Error)]
pub enum InternalError {
    /// Store layer error.
    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    /// File-system error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The migration manager reported a failure mid-pass.
    #[error("migration failed: {0}")]
    Migration(String),
}

impl Error {
    /// Stable numeric code for this error.
    ///
    /// Codes are part of the compatibility surface and never change:
    /// `1` unknown, `2` different storage exists at URL, `3` mapping model
    /// not found, `4` progressive migration required, `5` internal error,
    /// `6` user error, `7` user cancelled, `8` persistent store not found.
    pub fn code(&self) -> u32 {
        match self {
            Error::Unknown => 1,
            Error::DifferentStorageExistsAtUrl { .. } => 2,
            Error::MappingModelNotFound { .. } => 3,
            Error::ProgressiveMigrationRequired { .. } => 4,
            Error::Internal(_) => 5,
            Error::User(_) => 6,
            Error::UserCancelled => 7,
            Error::PersistentStoreNotFound { .. } => 8,
        }
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Internal(InternalError::Store(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(InternalError::Io(e))
    }
}
