//! Persisted role definitions

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{RoleDefinition, RoleUpdate};
use crate::core::{Result, ValidationError};
use crate::storage::{get_json, put_json};
use crate::traits::Storage;

/// Storage prefix of role definitions
pub const ROLE_PREFIX: &str = "roles/";

/// Persisted role definitions.
///
/// Writes, deletes and the read-merge-write of a partial update are
/// serialized by one lock; reads share it.
pub struct RoleStore {
    storage: Arc<dyn Storage>,
    lock: RwLock<()>,
}

impl RoleStore {
    /// Create a store over the host storage
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            lock: RwLock::new(()),
        }
    }

    /// Load a role; `None` when it does not exist
    pub async fn read(&self, name: &str) -> Result<Option<RoleDefinition>> {
        check_name(name)?;
        let _guard = self.lock.read().await;
        Ok(get_json(self.storage.as_ref(), &role_key(name)).await?)
    }

    /// Load a role, failing when it does not exist
    pub async fn require(&self, name: &str) -> Result<RoleDefinition> {
        self.read(name)
            .await?
            .ok_or_else(|| ValidationError::RoleNotFound(name.to_string()).into())
    }

    /// Create or partially update a role and return the stored definition
    pub async fn write(&self, name: &str, update: RoleUpdate) -> Result<RoleDefinition> {
        check_name(name)?;
        let key = role_key(name);
        let _guard = self.lock.write().await;

        let existing: Option<RoleDefinition> = get_json(self.storage.as_ref(), &key).await?;
        let created = existing.is_none();
        let role = update.apply(existing)?;
        put_json(self.storage.as_ref(), &key, &role).await?;

        info!(
            role = name,
            credential_type = %role.credential_type,
            created,
            "Role written"
        );
        Ok(role)
    }

    /// Delete a role; deleting a missing role succeeds
    pub async fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let _guard = self.lock.write().await;
        self.storage.delete(&role_key(name)).await?;
        debug!(role = name, "Role deleted");
        Ok(())
    }

    /// Sorted role names
    pub async fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.read().await;
        let mut names: Vec<String> = self
            .storage
            .list(ROLE_PREFIX)
            .await?
            .into_iter()
            .filter(|name| !name.ends_with('/'))
            .collect();
        names.sort();
        Ok(names)
    }
}

fn role_key(name: &str) -> String {
    format!("{ROLE_PREFIX}{name}")
}

fn check_name(name: &str) -> std::result::Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyRoleName);
    }
    Ok(())
}
