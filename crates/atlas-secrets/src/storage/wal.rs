//! Write-ahead log on top of any [`Storage`]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{get_json, put_json};
use crate::core::StorageError;
use crate::traits::{Storage, WalEntry, WriteAheadLog};

/// Key prefix of the WAL namespace
pub const WAL_PREFIX: &str = "wal/";

/// [`WriteAheadLog`] storing one JSON entry per record under [`WAL_PREFIX`]
#[derive(Clone)]
pub struct StorageWal {
    storage: Arc<dyn Storage>,
}

impl StorageWal {
    /// Wrap a storage backend
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn key(id: &str) -> String {
        format!("{WAL_PREFIX}{id}")
    }
}

#[async_trait]
impl WriteAheadLog for StorageWal {
    async fn put_wal(&self, kind: &str, data: serde_json::Value) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        let entry = WalEntry {
            id: id.clone(),
            kind: kind.to_string(),
            data,
            created_at: Utc::now(),
        };
        put_json(self.storage.as_ref(), &Self::key(&id), &entry).await?;
        Ok(id)
    }

    async fn delete_wal(&self, id: &str) -> Result<(), StorageError> {
        self.storage.delete(&Self::key(id)).await
    }

    async fn get_wal(&self, id: &str) -> Result<Option<WalEntry>, StorageError> {
        get_json(self.storage.as_ref(), &Self::key(id)).await
    }

    async fn list_wal(&self) -> Result<Vec<String>, StorageError> {
        let mut ids = self.storage.list(WAL_PREFIX).await?;
        ids.retain(|id| !id.ends_with('/'));
        Ok(ids)
    }
}
