//! Lazily built, cached Atlas client.
//!
//! One client per backend instance. The cache is emptied whenever the root
//! configuration is rewritten, and the rewrite happens under the same
//! exclusive lock, so no caller can observe a client built from superseded
//! credentials.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{ROOT_CONFIG_KEY, RootConfig};
use crate::core::{ConfigError, Result, StorageError};
use crate::storage::{get_json, put_json};
use crate::traits::{AtlasApi, ClientFactory, Storage};

/// Transport cache guarding the shared client
pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    client: RwLock<Option<Arc<dyn AtlasApi>>>,
}

impl ClientCache {
    /// Create an empty cache
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            client: RwLock::new(None),
        }
    }

    /// Return the cached client, building it from stored root credentials on first use
    pub async fn get_or_init(&self, storage: &dyn Storage) -> Result<Arc<dyn AtlasApi>> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(Arc::clone(client));
        }

        let mut slot = self.client.write().await;
        // another caller may have built it while we waited
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let config = load_root_config(storage)
            .await?
            .ok_or(ConfigError::RootConfigMissing)?;
        let client = self.factory.build(&config)?;
        debug!(public_key = %config.public_key, "Built Atlas client");

        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Persist new root credentials and drop the cached client atomically
    pub async fn replace_root_config(&self, storage: &dyn Storage, config: &RootConfig) -> Result<()> {
        config.validate()?;

        let mut slot = self.client.write().await;
        put_json(storage, ROOT_CONFIG_KEY, config).await?;
        *slot = None;

        info!(public_key = %config.public_key, "Root configuration updated, client cache invalidated");
        Ok(())
    }

    /// Load the stored root credentials under the shared lock
    pub async fn read_root_config(&self, storage: &dyn Storage) -> Result<Option<RootConfig>> {
        let _guard = self.client.read().await;
        load_root_config(storage).await
    }

    /// Whether a client is currently cached
    pub async fn is_cached(&self) -> bool {
        self.client.read().await.is_some()
    }
}

/// Load root credentials, mapping undecodable entries to a configuration error
async fn load_root_config(storage: &dyn Storage) -> Result<Option<RootConfig>> {
    match get_json::<RootConfig>(storage, ROOT_CONFIG_KEY).await {
        Ok(config) => Ok(config),
        Err(StorageError::Serialization { source, .. }) => {
            Err(ConfigError::RootConfigMalformed(source.to_string()).into())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{CountingFactory, MemoryAtlas};

    fn cache() -> (ClientCache, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::new(MemoryAtlas::new()));
        (ClientCache::new(factory.clone()), factory)
    }

    #[tokio::test]
    async fn test_missing_root_config_is_config_error() {
        let (cache, factory) = cache();
        let storage = MemoryStorage::new();

        let err = cache.get_or_init(&storage).await.err().unwrap();
        assert!(err.is_config());
        assert_eq!(factory.builds(), 0);
    }

    #[tokio::test]
    async fn test_client_is_built_once() {
        let (cache, factory) = cache();
        let storage = MemoryStorage::new();
        cache
            .replace_root_config(&storage, &RootConfig::new("pub", "priv"))
            .await
            .unwrap();

        cache.get_or_init(&storage).await.unwrap();
        cache.get_or_init(&storage).await.unwrap();
        assert_eq!(factory.builds(), 1);
        assert!(cache.is_cached().await);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let (cache, factory) = cache();
        let storage = MemoryStorage::new();
        cache
            .replace_root_config(&storage, &RootConfig::new("pub", "priv"))
            .await
            .unwrap();

        let (a, b, c) = tokio::join!(
            cache.get_or_init(&storage),
            cache.get_or_init(&storage),
            cache.get_or_init(&storage)
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(factory.builds(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_invalidates_client() {
        let (cache, factory) = cache();
        let storage = MemoryStorage::new();
        cache
            .replace_root_config(&storage, &RootConfig::new("pub-1", "priv"))
            .await
            .unwrap();
        cache.get_or_init(&storage).await.unwrap();

        cache
            .replace_root_config(&storage, &RootConfig::new("pub-2", "priv"))
            .await
            .unwrap();
        assert!(!cache.is_cached().await);

        cache.get_or_init(&storage).await.unwrap();
        assert_eq!(factory.builds(), 2);
        assert_eq!(factory.last_public_key().as_deref(), Some("pub-2"));
    }

    #[tokio::test]
    async fn test_read_root_config_sees_latest_write() {
        let (cache, _) = cache();
        let storage = MemoryStorage::new();
        assert!(cache.read_root_config(&storage).await.unwrap().is_none());

        cache
            .replace_root_config(&storage, &RootConfig::new("pub-1", "priv"))
            .await
            .unwrap();
        cache
            .replace_root_config(&storage, &RootConfig::new("pub-2", "priv"))
            .await
            .unwrap();

        let config = cache.read_root_config(&storage).await.unwrap().unwrap();
        assert_eq!(config.public_key, "pub-2");
    }

    #[tokio::test]
    async fn test_malformed_root_config() {
        let (cache, _) = cache();
        let storage = MemoryStorage::new();
        storage.put(ROOT_CONFIG_KEY, b"not json".to_vec()).await.unwrap();

        let err = cache.get_or_init(&storage).await.err().unwrap();
        assert!(err.is_config());
    }
}
