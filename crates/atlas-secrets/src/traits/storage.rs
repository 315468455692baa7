use async_trait::async_trait;

use crate::core::StorageError;

/// Persistent key-value storage supplied by the host.
///
/// Keys are `/`-separated paths. `list` returns the keys directly under a
/// prefix with the prefix stripped, sorted lexicographically.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load raw bytes stored at `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store raw bytes at `key`, overwriting any previous value
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Delete `key`; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List keys under `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
