//! In-memory storage for tests and embedded hosts

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::core::StorageError;
use crate::traits::Storage;

/// In-memory implementation of [`Storage`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` holds a value
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Every stored key starting with `prefix`, at any depth, sorted
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let keys: BTreeSet<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.into_iter().collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // Nested keys collapse into their first path segment, suffixed with '/'.
        let keys: BTreeSet<String> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(prefix)?;
                Some(match rest.find('/') {
                    Some(idx) => rest[..=idx].to_string(),
                    None => rest.to_string(),
                })
            })
            .collect();
        Ok(keys.into_iter().collect())
    }
}
