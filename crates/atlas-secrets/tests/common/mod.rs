//! Shared setup for backend integration tests

#![allow(dead_code)]

use std::sync::Arc;

use atlas_secrets::prelude::*;
use atlas_secrets::testing::{CountingFactory, FlakyWal, MemoryAtlas};

/// Route backend logs through the test harness writer
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Backend wired to in-memory collaborators, with handles to inspect them
pub struct Harness {
    pub backend: AtlasBackend,
    pub atlas: MemoryAtlas,
    pub storage: MemoryStorage,
    pub factory: Arc<CountingFactory>,
    pub wal: Arc<FlakyWal<StorageWal>>,
}

impl Harness {
    /// Backend with default configuration and root credentials already written
    pub async fn new() -> Self {
        Self::with_config(BackendConfig::default()).await
    }

    /// Backend with the given configuration and root credentials already written
    pub async fn with_config(config: BackendConfig) -> Self {
        let harness = Self::unconfigured(config);
        harness
            .backend
            .write_root_config(RootConfig::new("root-public", "root-private"))
            .await
            .unwrap();
        harness
    }

    /// Backend without root credentials
    pub fn unconfigured(config: BackendConfig) -> Self {
        init_tracing();
        let storage = MemoryStorage::new();
        let atlas = MemoryAtlas::new();
        let factory = Arc::new(CountingFactory::new(atlas.clone()));
        let wal = Arc::new(FlakyWal::new(StorageWal::new(Arc::new(storage.clone()))));

        let backend = AtlasBackend::builder()
            .storage(Arc::new(storage.clone()))
            .client_factory(factory.clone())
            .wal(wal.clone())
            .config(config)
            .build()
            .unwrap();

        Self {
            backend,
            atlas,
            storage,
            factory,
            wal,
        }
    }

    /// WAL record keys currently stored
    pub fn wal_keys(&self) -> Vec<String> {
        self.storage.keys_with_prefix("wal/")
    }
}

pub fn database_user_role() -> RoleUpdate {
    RoleUpdate::new()
        .credential_type("database_user")
        .project_id("proj1")
        .database_name("admin")
        .db_roles(vec![DatabaseRole::new("admin", "atlasAdmin")])
}

pub fn org_key_role() -> RoleUpdate {
    RoleUpdate::new()
        .credential_type("org_api_key")
        .organization_id("org1")
        .api_key_roles(["ORG_READ_ONLY"])
}

pub fn project_key_role() -> RoleUpdate {
    RoleUpdate::new()
        .credential_type("project_api_key")
        .project_id("proj1")
        .api_key_roles(["GROUP_READ_ONLY"])
}

pub fn assigned_key_role() -> RoleUpdate {
    RoleUpdate::new()
        .credential_type("project_assigned_api_key")
        .organization_id("org1")
        .project_id("proj1")
        .api_key_roles(["ORG_MEMBER"])
        .project_roles(["GROUP_DATA_ACCESS_READ_ONLY"])
}
