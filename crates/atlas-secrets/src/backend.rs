//! Atlas secrets backend - the host-facing entry point
//!
//! Wires the role store, transport cache, issuance engine, rollback routine
//! and renewal handler over the host's storage and WAL.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::{BackendConfig, LEASE_CONFIG_KEY, LeaseConfig, RootConfig};
use crate::core::{Result, StorageError};
use crate::issue::{IssuanceEngine, PrincipalNamer};
use crate::lease::resolve_with;
use crate::renew::renew;
use crate::revoke::{SweepReport, rollback, sweep};
use crate::role::{RoleDefinition, RoleStore, RoleUpdate};
use crate::secret::{IssuedSecret, ProvisioningRecord};
use crate::storage::{StorageWal, WAL_PREFIX, get_json, put_json};
use crate::traits::{AtlasApi, ClientFactory, Storage, WalEntry, WriteAheadLog};
use crate::transport::ClientCache;

/// Dynamic MongoDB Atlas credentials backend
pub struct AtlasBackend {
    storage: Arc<dyn Storage>,
    wal: Arc<dyn WriteAheadLog>,
    clients: ClientCache,
    roles: RoleStore,
    namer: PrincipalNamer,
    config: BackendConfig,
}

impl AtlasBackend {
    /// Create a builder
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use atlas_secrets::prelude::*;
    /// use std::sync::Arc;
    ///
    /// # fn example(factory: Arc<dyn ClientFactory>) -> Result<(), BackendError> {
    /// let backend = AtlasBackend::builder()
    ///     .storage(Arc::new(MemoryStorage::new()))
    ///     .client_factory(factory)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> AtlasBackendBuilder<Missing, Missing> {
        AtlasBackendBuilder::new()
    }

    /// Static configuration this backend was built with
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Issue a fresh credential from `role_name` for the requester `display_name`
    pub async fn issue(&self, role_name: &str, display_name: &str) -> Result<IssuedSecret> {
        let role = self.roles.require(role_name).await?;
        let client = self.client().await?;
        let lease = resolve_with(role.ttl, role.max_ttl, self.lease_defaults().await?);

        debug!(role = role_name, credential_type = %role.credential_type, "Issuing credential");
        IssuanceEngine::new(
            client.as_ref(),
            self.wal.as_ref(),
            &self.namer,
            self.config.password_length,
        )
        .issue(role_name, &role, display_name, lease, Utc::now())
        .await
    }

    /// Re-resolve the lease of an issued secret against current configuration
    pub async fn renew(&self, secret: IssuedSecret) -> Result<IssuedSecret> {
        let role = self.roles.read(&secret.internal.role_name).await?;
        let defaults = self.lease_defaults().await?;
        Ok(renew(secret, role.as_ref(), defaults))
    }

    /// Remove the remote principal behind an issued secret
    pub async fn revoke(&self, secret: &IssuedSecret) -> Result<()> {
        info!(
            principal = secret.principal(),
            role = %secret.internal.role_name,
            "Revoking credential"
        );
        self.rollback(&secret.internal.record).await
    }

    /// Remove the remote principal described by a provisioning record
    pub async fn rollback(&self, record: &ProvisioningRecord) -> Result<()> {
        let client = self.client().await?;
        rollback(client.as_ref(), record).await
    }

    /// Roll back a WAL entry handed over by the host's own scanner
    pub async fn rollback_wal_entry(&self, entry: &WalEntry) -> Result<()> {
        let record: ProvisioningRecord =
            serde_json::from_value(entry.data.clone()).map_err(|source| {
                StorageError::Serialization {
                    key: format!("{WAL_PREFIX}{}", entry.id),
                    source,
                }
            })?;
        self.rollback(&record).await
    }

    /// Roll back every WAL record older than the configured minimum age
    pub async fn rollback_stale(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let client = self.client().await?;
        sweep(
            client.as_ref(),
            self.wal.as_ref(),
            self.config.wal_rollback_min_age,
            now,
        )
        .await
    }

    /// Create or partially update a role
    pub async fn write_role(&self, name: &str, update: RoleUpdate) -> Result<RoleDefinition> {
        self.roles.write(name, update).await
    }

    /// Load a role
    pub async fn read_role(&self, name: &str) -> Result<Option<RoleDefinition>> {
        self.roles.read(name).await
    }

    /// Delete a role
    pub async fn delete_role(&self, name: &str) -> Result<()> {
        self.roles.delete(name).await
    }

    /// Sorted role names
    pub async fn list_roles(&self) -> Result<Vec<String>> {
        self.roles.list().await
    }

    /// Replace the root credentials, invalidating the cached client
    pub async fn write_root_config(&self, config: RootConfig) -> Result<()> {
        self.clients
            .replace_root_config(self.storage.as_ref(), &config)
            .await
    }

    /// Public key of the stored root credentials
    pub async fn read_root_config(&self) -> Result<Option<String>> {
        Ok(self
            .clients
            .read_root_config(self.storage.as_ref())
            .await?
            .map(|config| config.public_key))
    }

    /// Store the mount-level lease override
    pub async fn write_lease_config(&self, config: LeaseConfig) -> Result<()> {
        config.validate()?;
        put_json(self.storage.as_ref(), LEASE_CONFIG_KEY, &config).await?;
        info!(ttl = ?config.ttl, max_ttl = ?config.max_ttl, "Lease configuration updated");
        Ok(())
    }

    /// Load the mount-level lease override
    pub async fn read_lease_config(&self) -> Result<Option<LeaseConfig>> {
        Ok(get_json(self.storage.as_ref(), LEASE_CONFIG_KEY).await?)
    }

    async fn lease_defaults(&self) -> Result<LeaseConfig> {
        let stored = self.read_lease_config().await?;
        Ok(self.config.lease_defaults(stored))
    }

    async fn client(&self) -> Result<Arc<dyn AtlasApi>> {
        self.clients.get_or_init(self.storage.as_ref()).await
    }
}

/// Builder slot not filled yet
#[doc(hidden)]
pub struct Missing;

/// Builder for [`AtlasBackend`].
///
/// Storage and client factory are required and checked at compile time.
pub struct AtlasBackendBuilder<S, F> {
    storage: S,
    factory: F,
    wal: Option<Arc<dyn WriteAheadLog>>,
    config: BackendConfig,
}

impl AtlasBackendBuilder<Missing, Missing> {
    /// Create new builder instance
    pub fn new() -> Self {
        Self {
            storage: Missing,
            factory: Missing,
            wal: None,
            config: BackendConfig::default(),
        }
    }
}

impl Default for AtlasBackendBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> AtlasBackendBuilder<Missing, F> {
    /// Set the host KV storage (required)
    pub fn storage(self, storage: Arc<dyn Storage>) -> AtlasBackendBuilder<Arc<dyn Storage>, F> {
        AtlasBackendBuilder {
            storage,
            factory: self.factory,
            wal: self.wal,
            config: self.config,
        }
    }
}

impl<S> AtlasBackendBuilder<S, Missing> {
    /// Set the factory building authenticated clients (required)
    pub fn client_factory(
        self,
        factory: Arc<dyn ClientFactory>,
    ) -> AtlasBackendBuilder<S, Arc<dyn ClientFactory>> {
        AtlasBackendBuilder {
            storage: self.storage,
            factory,
            wal: self.wal,
            config: self.config,
        }
    }
}

impl<S, F> AtlasBackendBuilder<S, F> {
    /// Use a host-provided WAL instead of one kept in the KV storage
    pub fn wal(mut self, wal: Arc<dyn WriteAheadLog>) -> Self {
        self.wal = Some(wal);
        self
    }

    /// Set the system configuration
    pub fn config(mut self, config: BackendConfig) -> Self {
        self.config = config;
        self
    }
}

impl AtlasBackendBuilder<Arc<dyn Storage>, Arc<dyn ClientFactory>> {
    /// Validate the configuration and build the backend
    pub fn build(self) -> Result<AtlasBackend> {
        self.config.validate()?;
        let namer = PrincipalNamer::new(&self.config.username_prefix)?;
        let wal: Arc<dyn WriteAheadLog> = match self.wal {
            Some(wal) => wal,
            None => Arc::new(StorageWal::new(Arc::clone(&self.storage))),
        };

        Ok(AtlasBackend {
            clients: ClientCache::new(self.factory),
            roles: RoleStore::new(Arc::clone(&self.storage)),
            storage: self.storage,
            wal,
            namer,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{CountingFactory, MemoryAtlas};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn backend() -> (AtlasBackend, MemoryStorage) {
        let storage = MemoryStorage::new();
        let backend = AtlasBackend::builder()
            .storage(Arc::new(storage.clone()))
            .client_factory(Arc::new(CountingFactory::new(MemoryAtlas::new())))
            .build()
            .unwrap();
        (backend, storage)
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        let result = AtlasBackend::builder()
            .storage(Arc::new(MemoryStorage::new()))
            .client_factory(Arc::new(CountingFactory::new(MemoryAtlas::new())))
            .config(BackendConfig {
                password_length: 8,
                ..Default::default()
            })
            .build();
        assert!(result.err().is_some_and(|e| e.is_config()));
    }

    #[tokio::test]
    async fn test_read_root_config_exposes_public_key_only() {
        let (backend, _) = backend();
        assert_eq!(backend.read_root_config().await.unwrap(), None);

        backend
            .write_root_config(RootConfig::new("pub-key", "priv-key"))
            .await
            .unwrap();
        assert_eq!(
            backend.read_root_config().await.unwrap().as_deref(),
            Some("pub-key")
        );
    }

    #[tokio::test]
    async fn test_lease_config_round_trip_and_validation() {
        let (backend, storage) = backend();
        let config = LeaseConfig {
            ttl: Duration::from_secs(60),
            max_ttl: Duration::from_secs(120),
        };
        backend.write_lease_config(config).await.unwrap();
        assert!(storage.contains(LEASE_CONFIG_KEY));
        assert_eq!(backend.read_lease_config().await.unwrap(), Some(config));

        let bad = LeaseConfig {
            ttl: Duration::from_secs(300),
            max_ttl: Duration::from_secs(120),
        };
        assert!(backend.write_lease_config(bad).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_issue_without_root_config_is_config_error() {
        let (backend, storage) = backend();
        backend
            .write_role(
                "r",
                RoleUpdate::new()
                    .credential_type("org_api_key")
                    .organization_id("org1")
                    .api_key_roles(["ORG_MEMBER"]),
            )
            .await
            .unwrap();

        let err = backend.issue("r", "alice").await.unwrap_err();
        assert!(err.is_config());
        assert!(storage.keys_with_prefix(WAL_PREFIX).is_empty());
    }
}
