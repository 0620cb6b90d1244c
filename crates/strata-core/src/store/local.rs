//! Local store implementation over sled.

use super::meta::StoreMetadata;
use super::record::Record;
use crate::error::Error;
use sled::{Db, Tree};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Tree name for record data.
const DATA_TREE: &str = "data";

/// Tree name for store metadata.
const META_TREE: &str = "meta";

/// Key for the persisted schema metadata in the meta tree.
const METADATA_KEY: &[u8] = b"schema_metadata";

/// Separator between the entity name and the record id in data keys.
/// Entity names must not contain NUL.
const KEY_SEPARATOR: u8 = 0;

/// Descriptor for a local store directory.
///
/// This is a plain value describing *where* a store lives and *how* it may
/// be migrated; opening it yields a [`LocalStore`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LocalStorage {
    /// Path of the store directory.
    pub path: PathBuf,
    /// Fail planning with a distinct error instead of executing a
    /// multi-hop migration.
    pub prevent_progressive_migration: bool,
}

impl LocalStorage {
    /// Create a descriptor for the given directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prevent_progressive_migration: false,
        }
    }

    /// Disallow multi-hop migration plans for this storage.
    pub fn with_progressive_migration_disabled(mut self) -> Self {
        self.prevent_progressive_migration = true;
        self
    }

    /// Check whether anything exists at the descriptor's path.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// An open local store.
#[derive(Debug)]
pub struct LocalStore {
    db: Db,
    data: Tree,
    meta: Tree,
    path: PathBuf,
}

impl LocalStore {
    /// Open or create a store at the given path.
    ///
    /// A path occupied by a plain file, or by a non-empty directory that is
    /// not a strata store, fails with
    /// [`Error::DifferentStorageExistsAtUrl`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        if path.exists() {
            if path.is_file() {
                return Err(Error::DifferentStorageExistsAtUrl { path });
            }
            if !is_store_dir(&path) && !dir_is_empty(&path)? {
                return Err(Error::DifferentStorageExistsAtUrl { path });
            }
        }

        let db = sled::Config::new().path(&path).open()?;
        let data = db.open_tree(DATA_TREE)?;
        let meta = db.open_tree(META_TREE)?;

        Ok(Self {
            db,
            data,
            meta,
            path,
        })
    }

    /// Open a store that must already exist.
    pub fn open_existing(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        if !path.exists() {
            return Err(Error::PersistentStoreNotFound { path });
        }
        Self::open(path)
    }

    /// Path of the store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted schema metadata, if the store was ever stamped.
    pub fn metadata(&self) -> Result<Option<StoreMetadata>, Error> {
        match self.meta.get(METADATA_KEY)? {
            Some(bytes) => Ok(Some(StoreMetadata::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist schema metadata.
    pub fn set_metadata(&self, metadata: &StoreMetadata) -> Result<(), Error> {
        self.meta.insert(METADATA_KEY, metadata.to_bytes()?)?;
        Ok(())
    }

    /// Insert or replace a record.
    pub fn insert_record(
        &self,
        entity: &str,
        id: [u8; 16],
        record: &Record,
    ) -> Result<(), Error> {
        self.data
            .insert(record_key(entity, &id), record.to_bytes()?)?;
        Ok(())
    }

    /// Get a record by entity name and id.
    pub fn get_record(&self, entity: &str, id: [u8; 16]) -> Result<Option<Record>, Error> {
        match self.data.get(record_key(entity, &id))? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete_record(&self, entity: &str, id: [u8; 16]) -> Result<bool, Error> {
        Ok(self.data.remove(record_key(entity, &id))?.is_some())
    }

    /// All records of an entity, in id order.
    pub fn records(&self, entity: &str) -> Result<Vec<([u8; 16], Record)>, Error> {
        let mut records = Vec::new();
        for result in self.data.scan_prefix(entity_prefix(entity)) {
            let (key, bytes) = result?;
            let id = decode_record_id(&key, entity)?;
            records.push((id, Record::from_bytes(&bytes)?));
        }
        Ok(records)
    }

    /// Count the records of an entity.
    pub fn count_records(&self, entity: &str) -> Result<u64, Error> {
        let mut count = 0u64;
        for result in self.data.scan_prefix(entity_prefix(entity)) {
            result?;
            count += 1;
        }
        Ok(count)
    }

    /// Remove every record of an entity.
    pub fn remove_all_records(&self, entity: &str) -> Result<(), Error> {
        let keys: Vec<_> = self
            .data
            .scan_prefix(entity_prefix(entity))
            .keys()
            .collect::<Result<_, _>>()?;
        for key in keys {
            self.data.remove(key)?;
        }
        Ok(())
    }

    /// Rewrite every record of `from` under the entity name `to`.
    pub fn rename_entity_records(&self, from: &str, to: &str) -> Result<(), Error> {
        let entries: Vec<_> = self
            .data
            .scan_prefix(entity_prefix(from))
            .collect::<Result<_, _>>()?;
        for (key, value) in entries {
            let id = decode_record_id(&key, from)?;
            self.data.insert(record_key(to, &id), value)?;
            self.data.remove(key)?;
        }
        Ok(())
    }

    /// Apply a batch of data-tree operations atomically.
    pub fn apply_batch(&self, batch: sled::Batch) -> Result<(), Error> {
        self.data.apply_batch(batch)?;
        Ok(())
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

/// Encode the data-tree key of a record.
pub(crate) fn record_key(entity: &str, id: &[u8; 16]) -> Vec<u8> {
    let mut key = Vec::with_capacity(entity.len() + 1 + id.len());
    key.extend_from_slice(entity.as_bytes());
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(id);
    key
}

/// Key prefix covering every record of an entity.
pub(crate) fn entity_prefix(entity: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(entity.len() + 1);
    prefix.extend_from_slice(entity.as_bytes());
    prefix.push(KEY_SEPARATOR);
    prefix
}

fn decode_record_id(key: &[u8], entity: &str) -> Result<[u8; 16], Error> {
    let id_bytes = &key[entity.len() + 1..];
    id_bytes.try_into().map_err(|_| {
        Error::Internal(crate::error::InternalError::Deserialization(format!(
            "malformed record key for entity {entity:?}"
        )))
    })
}

/// Check whether a directory holds a sled store.
fn is_store_dir(path: &Path) -> bool {
    path.join("conf").is_file()
}

fn dir_is_empty(path: &Path) -> Result<bool, Error> {
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Atomically replace the store at `original` with the migrated store at
/// `migrated`.
///
/// Write-then-rename discipline: the original is first renamed to a
/// `.backup` sibling, the migrated store is renamed into place, then the
/// backup is dropped. No crash point leaves both the original and the
/// replacement absent - if the second rename fails the backup is restored.
pub fn replace_store(original: &Path, migrated: &Path) -> Result<(), Error> {
    let backup = backup_path(original);
    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }

    fs::rename(original, &backup)?;
    if let Err(e) = fs::rename(migrated, original) {
        // Put the original back; the store must never disappear.
        let _ = fs::rename(&backup, original);
        return Err(e.into());
    }

    if let Err(e) = fs::remove_dir_all(&backup) {
        warn!(path = %backup.display(), error = %e, "failed to remove store backup");
    }
    Ok(())
}

fn backup_path(original: &Path) -> PathBuf {
    let mut name = original
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".backup");
    original.with_file_name(name)
}
