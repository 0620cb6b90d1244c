//! The local store - a sled database directory holding rkyv-encoded
//! records plus persisted schema metadata.

mod local;
mod meta;
mod record;
mod value;

pub use local::{replace_store, LocalStorage, LocalStore};
pub(crate) use local::record_key;
pub use meta::StoreMetadata;
pub use record::Record;
pub use value::Value;
