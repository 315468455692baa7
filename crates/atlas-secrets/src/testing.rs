//! Test doubles: an in-memory Atlas with fault injection, a counting client
//! factory and a WAL whose writes and deletes can be made to fail.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::atlas::{
    AccessListEntry, ApiKey, ApiKeyInput, ApiKeyRole, AssignApiKey, AtlasError, DatabaseUser,
};
use crate::config::RootConfig;
use crate::core::{ConfigError, SecureString, StorageError};
use crate::traits::{AtlasApi, ClientFactory, WalEntry, WriteAheadLog};

#[derive(Default)]
struct Faults {
    create: AtomicBool,
    assign: AtomicBool,
    access_list: AtomicBool,
    delete: AtomicBool,
}

#[derive(Default)]
struct State {
    // (project_id, username)
    users: DashMap<(String, String), DatabaseUser>,
    // key id -> (owning org, key without private half)
    keys: DashMap<String, (String, ApiKey)>,
    // (project_id, key id) -> project roles
    assignments: DashMap<(String, String), Vec<String>>,
    access_lists: DashMap<String, Vec<AccessListEntry>>,
    project_orgs: DashMap<String, String>,
    next_id: AtomicU64,
    calls: AtomicUsize,
    faults: Faults,
}

/// In-memory Atlas account-management API.
///
/// Clones share state, so a test can hand one clone to the backend and
/// inspect the remote side through another.
#[derive(Clone, Default)]
pub struct MemoryAtlas {
    state: Arc<State>,
}

impl MemoryAtlas {
    /// Create an empty fake
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next create call fail
    pub fn fail_next_create(&self) {
        self.state.faults.create.store(true, Ordering::SeqCst);
    }

    /// Make the next project assignment fail
    pub fn fail_next_assign(&self) {
        self.state.faults.assign.store(true, Ordering::SeqCst);
    }

    /// Make the next access-list call fail
    pub fn fail_next_access_list(&self) {
        self.state.faults.access_list.store(true, Ordering::SeqCst);
    }

    /// Make the next delete or unassign call fail
    pub fn fail_next_delete(&self) {
        self.state.faults.delete.store(true, Ordering::SeqCst);
    }

    /// Organization that owns keys created in `project_id`; defaults to `org-<project_id>`
    pub fn set_project_org(&self, project_id: &str, org_id: &str) {
        self.state
            .project_orgs
            .insert(project_id.to_string(), org_id.to_string());
    }

    /// Total remote calls received
    pub fn call_count(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Whether a database user exists
    pub fn has_user(&self, project_id: &str, username: &str) -> bool {
        self.state
            .users
            .contains_key(&(project_id.to_string(), username.to_string()))
    }

    /// Number of database users
    pub fn user_count(&self) -> usize {
        self.state.users.len()
    }

    /// Number of API keys
    pub fn key_count(&self) -> usize {
        self.state.keys.len()
    }

    /// Key with the given description
    pub fn key_by_description(&self, description: &str) -> Option<ApiKey> {
        self.state
            .keys
            .iter()
            .find(|entry| entry.value().1.desc == description)
            .map(|entry| entry.value().1.clone())
    }

    /// Whether `key_id` is assigned to `project_id`
    pub fn is_assigned(&self, project_id: &str, key_id: &str) -> bool {
        self.state
            .assignments
            .contains_key(&(project_id.to_string(), key_id.to_string()))
    }

    /// Access-list entries of a key
    pub fn access_list(&self, key_id: &str) -> Vec<AccessListEntry> {
        self.state
            .access_lists
            .get(key_id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn call(&self) {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn injected(flag: &AtomicBool, what: &str) -> Result<(), AtlasError> {
        if flag.swap(false, Ordering::SeqCst) {
            return Err(AtlasError::api(500, format!("injected {what} failure")));
        }
        Ok(())
    }

    fn project_org(&self, project_id: &str) -> String {
        self.state
            .project_orgs
            .get(project_id)
            .map(|org| org.clone())
            .unwrap_or_else(|| format!("org-{project_id}"))
    }

    fn mint_key(&self, org_id: &str, project_id: Option<&str>, input: &ApiKeyInput) -> ApiKey {
        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let key = ApiKey {
            id: format!("key-{n}"),
            desc: input.desc.clone(),
            public_key: format!("pub-{n}"),
            private_key: None,
            roles: input
                .roles
                .iter()
                .map(|role| ApiKeyRole {
                    role_name: role.clone(),
                    org_id: Some(org_id.to_string()),
                    project_id: project_id.map(str::to_string),
                })
                .collect(),
        };
        self.state
            .keys
            .insert(key.id.clone(), (org_id.to_string(), key.clone()));

        ApiKey {
            private_key: Some(SecureString::new(format!("priv-{n}"))),
            ..key
        }
    }

    fn org_key(&self, org_id: &str, key_id: &str) -> Result<ApiKey, AtlasError> {
        self.state
            .keys
            .get(key_id)
            .filter(|entry| entry.value().0 == org_id)
            .map(|entry| entry.value().1.clone())
            .ok_or_else(|| AtlasError::not_found(format!("API key {key_id}")))
    }
}

#[async_trait]
impl AtlasApi for MemoryAtlas {
    async fn create_database_user(
        &self,
        project_id: &str,
        user: &DatabaseUser,
    ) -> Result<DatabaseUser, AtlasError> {
        self.call();
        Self::injected(&self.state.faults.create, "create")?;

        let key = (project_id.to_string(), user.username.clone());
        if self.state.users.contains_key(&key) {
            return Err(AtlasError::api(409, "USER_ALREADY_EXISTS"));
        }
        let stored = DatabaseUser {
            password: None,
            ..user.clone()
        };
        self.state.users.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_database_user(
        &self,
        project_id: &str,
        username: &str,
    ) -> Result<DatabaseUser, AtlasError> {
        self.call();
        self.state
            .users
            .get(&(project_id.to_string(), username.to_string()))
            .map(|user| user.clone())
            .ok_or_else(|| AtlasError::not_found(format!("database user {username}")))
    }

    async fn delete_database_user(
        &self,
        project_id: &str,
        username: &str,
    ) -> Result<(), AtlasError> {
        self.call();
        Self::injected(&self.state.faults.delete, "delete")?;
        self.state
            .users
            .remove(&(project_id.to_string(), username.to_string()))
            .map(|_| ())
            .ok_or_else(|| AtlasError::not_found(format!("database user {username}")))
    }

    async fn create_api_key(&self, org_id: &str, input: &ApiKeyInput) -> Result<ApiKey, AtlasError> {
        self.call();
        Self::injected(&self.state.faults.create, "create")?;
        Ok(self.mint_key(org_id, None, input))
    }

    async fn get_api_key(&self, org_id: &str, key_id: &str) -> Result<ApiKey, AtlasError> {
        self.call();
        self.org_key(org_id, key_id)
    }

    async fn delete_api_key(&self, org_id: &str, key_id: &str) -> Result<(), AtlasError> {
        self.call();
        Self::injected(&self.state.faults.delete, "delete")?;
        self.org_key(org_id, key_id)?;

        self.state.keys.remove(key_id);
        self.state.access_lists.remove(key_id);
        self.state.assignments.retain(|(_, id), _| id.as_str() != key_id);
        Ok(())
    }

    async fn list_api_keys(&self, org_id: &str) -> Result<Vec<ApiKey>, AtlasError> {
        self.call();
        Ok(self
            .state
            .keys
            .iter()
            .filter(|entry| entry.value().0 == org_id)
            .map(|entry| entry.value().1.clone())
            .collect())
    }

    async fn create_project_api_key(
        &self,
        project_id: &str,
        input: &ApiKeyInput,
    ) -> Result<ApiKey, AtlasError> {
        self.call();
        Self::injected(&self.state.faults.create, "create")?;

        let org_id = self.project_org(project_id);
        let key = self.mint_key(&org_id, Some(project_id), input);
        self.state.assignments.insert(
            (project_id.to_string(), key.id.clone()),
            input.roles.clone(),
        );
        Ok(key)
    }

    async fn assign_project_api_key(
        &self,
        project_id: &str,
        key_id: &str,
        assignment: &AssignApiKey,
    ) -> Result<(), AtlasError> {
        self.call();
        Self::injected(&self.state.faults.assign, "assign")?;

        if !self.state.keys.contains_key(key_id) {
            return Err(AtlasError::not_found(format!("API key {key_id}")));
        }
        self.state.assignments.insert(
            (project_id.to_string(), key_id.to_string()),
            assignment.roles.clone(),
        );
        Ok(())
    }

    async fn unassign_project_api_key(
        &self,
        project_id: &str,
        key_id: &str,
    ) -> Result<(), AtlasError> {
        self.call();
        Self::injected(&self.state.faults.delete, "unassign")?;
        self.state
            .assignments
            .remove(&(project_id.to_string(), key_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| AtlasError::not_found(format!("API key {key_id} in project {project_id}")))
    }

    async fn list_project_api_keys(&self, project_id: &str) -> Result<Vec<ApiKey>, AtlasError> {
        self.call();
        Ok(self
            .state
            .assignments
            .iter()
            .filter(|entry| entry.key().0 == project_id)
            .filter_map(|entry| self.state.keys.get(&entry.key().1).map(|k| k.value().1.clone()))
            .collect())
    }

    async fn add_access_list_entry(
        &self,
        org_id: &str,
        key_id: &str,
        entry: &AccessListEntry,
    ) -> Result<(), AtlasError> {
        self.call();
        Self::injected(&self.state.faults.access_list, "access-list")?;
        self.org_key(org_id, key_id)?;

        self.state
            .access_lists
            .entry(key_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }
}

/// [`ClientFactory`] handing out one shared [`MemoryAtlas`] and counting builds
pub struct CountingFactory {
    atlas: MemoryAtlas,
    builds: AtomicUsize,
    fail_on_build: AtomicBool,
    last_public_key: Mutex<Option<String>>,
}

impl CountingFactory {
    /// Wrap a fake
    pub fn new(atlas: MemoryAtlas) -> Self {
        Self {
            atlas,
            builds: AtomicUsize::new(0),
            fail_on_build: AtomicBool::new(false),
            last_public_key: Mutex::new(None),
        }
    }

    /// Number of clients built so far
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Make the next build fail
    pub fn fail_next_build(&self) {
        self.fail_on_build.store(true, Ordering::SeqCst);
    }

    /// Public key of the root config used by the latest build
    pub fn last_public_key(&self) -> Option<String> {
        self.last_public_key
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

impl ClientFactory for CountingFactory {
    fn build(&self, config: &RootConfig) -> Result<Arc<dyn AtlasApi>, ConfigError> {
        if self.fail_on_build.swap(false, Ordering::SeqCst) {
            return Err(ConfigError::ClientBuild("injected build failure".into()));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_public_key.lock() {
            *last = Some(config.public_key.clone());
        }
        Ok(Arc::new(self.atlas.clone()))
    }
}

/// [`WriteAheadLog`] wrapper whose next put or delete can be made to fail
pub struct FlakyWal<W> {
    inner: W,
    fail_on_put: AtomicBool,
    fail_on_delete: AtomicBool,
}

impl<W: WriteAheadLog> FlakyWal<W> {
    /// Wrap a WAL
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            fail_on_put: AtomicBool::new(false),
            fail_on_delete: AtomicBool::new(false),
        }
    }

    /// Make the next put fail
    pub fn fail_next_put(&self) {
        self.fail_on_put.store(true, Ordering::SeqCst);
    }

    /// Make the next delete fail
    pub fn fail_next_delete(&self) {
        self.fail_on_delete.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<W: WriteAheadLog> WriteAheadLog for FlakyWal<W> {
    async fn put_wal(&self, kind: &str, data: serde_json::Value) -> Result<String, StorageError> {
        if self.fail_on_put.swap(false, Ordering::SeqCst) {
            return Err(StorageError::backend("put", "wal/", "injected failure"));
        }
        self.inner.put_wal(kind, data).await
    }

    async fn delete_wal(&self, id: &str) -> Result<(), StorageError> {
        if self.fail_on_delete.swap(false, Ordering::SeqCst) {
            return Err(StorageError::backend("delete", format!("wal/{id}"), "injected failure"));
        }
        self.inner.delete_wal(id).await
    }

    async fn get_wal(&self, id: &str) -> Result<Option<WalEntry>, StorageError> {
        self.inner.get_wal(id).await
    }

    async fn list_wal(&self) -> Result<Vec<String>, StorageError> {
        self.inner.list_wal().await
    }
}
