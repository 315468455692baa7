use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::StorageError;

/// A durable marker written before a risky remote call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Identifier returned by [`WriteAheadLog::put_wal`]
    pub id: String,
    /// Record kind, used to route the rollback
    pub kind: String,
    /// Opaque record payload
    pub data: serde_json::Value,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

/// Write-ahead log primitive owned by the storage layer
#[async_trait]
pub trait WriteAheadLog: Send + Sync {
    /// Persist a record and return its identifier
    async fn put_wal(&self, kind: &str, data: serde_json::Value) -> Result<String, StorageError>;

    /// Delete a record; deleting a missing record is not an error
    async fn delete_wal(&self, id: &str) -> Result<(), StorageError>;

    /// Load a record
    async fn get_wal(&self, id: &str) -> Result<Option<WalEntry>, StorageError>;

    /// List record identifiers
    async fn list_wal(&self) -> Result<Vec<String>, StorageError>;
}
