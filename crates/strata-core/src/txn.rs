//! Transaction support for atomic multi-record operations.

use crate::error::Error;
use crate::schema::SchemaModel;
use crate::store::{record_key, LocalStore, Record};

/// A pending operation in a transaction.
#[derive(Debug, Clone)]
enum TransactionOp {
    /// Insert or replace a record.
    Put {
        entity: String,
        id: [u8; 16],
        record: Record,
    },
    /// Remove a record.
    Delete { entity: String, id: [u8; 16] },
}

/// A transaction queuing record operations for one atomic commit.
///
/// Operations validate against the schema model when queued and are applied
/// as a single store batch on commit. A cancelled transaction refuses to
/// commit with [`Error::UserCancelled`].
#[derive(Debug)]
pub struct Transaction<'a> {
    store: &'a LocalStore,
    model: &'a SchemaModel,
    ops: Vec<TransactionOp>,
    cancelled: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(store: &'a LocalStore, model: &'a SchemaModel) -> Self {
        Self {
            store,
            model,
            ops: Vec::new(),
            cancelled: false,
        }
    }

    /// Queue an insert or replace.
    pub fn put(
        &mut self,
        entity: impl Into<String>,
        id: [u8; 16],
        record: Record,
    ) -> Result<&mut Self, Error> {
        let entity = entity.into();
        let entity_def = self
            .model
            .get_entity(&entity)
            .ok_or_else(|| Error::User(format!("unknown entity {entity:?}")))?;
        for (name, value) in &record.values {
            if let Some(attribute) = entity_def.get_attribute(name) {
                if !value.is_null() && !value.matches_type(&attribute.attribute_type) {
                    return Err(Error::User(format!(
                        "value for {entity}.{name} does not match its declared type"
                    )));
                }
            } else if entity_def.get_relationship(name).is_none() {
                return Err(Error::User(format!(
                    "entity {entity:?} declares no property named {name:?}"
                )));
            }
        }
        self.ops.push(TransactionOp::Put { entity, id, record });
        Ok(self)
    }

    /// Queue a delete.
    pub fn delete(&mut self, entity: impl Into<String>, id: [u8; 16]) -> Result<&mut Self, Error> {
        let entity = entity.into();
        if self.model.get_entity(&entity).is_none() {
            return Err(Error::User(format!("unknown entity {entity:?}")));
        }
        self.ops.push(TransactionOp::Delete { entity, id });
        Ok(self)
    }

    /// Mark the transaction as cancelled; commit will refuse.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if no operations are queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every queued operation atomically.
    pub fn commit(self) -> Result<(), Error> {
        if self.cancelled {
            return Err(Error::UserCancelled);
        }

        let mut batch = sled::Batch::default();
        for op in &self.ops {
            match op {
                TransactionOp::Put { entity, id, record } => {
                    batch.insert(record_key(entity, id), record.to_bytes()?);
                }
                TransactionOp::Delete { entity, id } => {
                    batch.remove(record_key(entity, id));
                }
            }
        }
        self.store.apply_batch(batch)?;
        self.store.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDef, AttributeType, EntityDef, ScalarType};
    use crate::store::Value;
    use tempfile::tempdir;

    fn model() -> SchemaModel {
        SchemaModel::new("v1").with_entity(
            EntityDef::new("Person", "id")
                .with_attribute(AttributeDef::new(
                    "id",
                    AttributeType::scalar(ScalarType::Uuid),
                ))
                .with_attribute(AttributeDef::new(
                    "name",
                    AttributeType::scalar(ScalarType::String),
                )),
        )
    }

    #[test]
    fn test_commit_applies_all_ops() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("store")).unwrap();
        let model = model();

        let existing = [9u8; 16];
        store
            .insert_record("Person", existing, &Record::new())
            .unwrap();

        let mut txn = Transaction::new(&store, &model);
        txn.put(
            "Person",
            [1u8; 16],
            Record::new().with("name", Value::String("Ada".into())),
        )
        .unwrap();
        txn.delete("Person", existing).unwrap();
        txn.commit().unwrap();

        assert!(store.get_record("Person", [1u8; 16]).unwrap().is_some());
        assert!(store.get_record("Person", existing).unwrap().is_none());
    }

    #[test]
    fn test_cancelled_transaction_refuses_commit() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("store")).unwrap();
        let model = model();

        let mut txn = Transaction::new(&store, &model);
        txn.put("Person", [1u8; 16], Record::new()).unwrap();
        txn.cancel();

        let err = txn.commit().unwrap_err();
        assert_eq!(err.code(), 7);
        assert!(store.get_record("Person", [1u8; 16]).unwrap().is_none());
    }

    #[test]
    fn test_put_validates_against_schema() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("store")).unwrap();
        let model = model();

        let mut txn = Transaction::new(&store, &model);

        let err = txn
            .put("Ghost", [1u8; 16], Record::new())
            .unwrap_err();
        assert_eq!(err.code(), 6);

        let err = txn
            .put(
                "Person",
                [1u8; 16],
                Record::new().with("name", Value::Int64(5)),
            )
            .unwrap_err();
        assert_eq!(err.code(), 6);
    }
}
