//! Storage implementations and JSON entry helpers

mod memory;
mod wal;

pub use memory::MemoryStorage;
pub use wal::{StorageWal, WAL_PREFIX};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::StorageError;
use crate::traits::Storage;

/// Load and decode a JSON entry
pub async fn get_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match storage.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Serialization {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode and store a JSON entry
pub async fn put_json<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(value).map_err(|source| StorageError::Serialization {
        key: key.to_string(),
        source,
    })?;
    storage.put(key, bytes).await
}
