use std::sync::Arc;

use async_trait::async_trait;

use crate::atlas::{AccessListEntry, ApiKey, ApiKeyInput, AssignApiKey, AtlasError, DatabaseUser};
use crate::config::RootConfig;
use crate::core::ConfigError;

/// Call contract of the remote account-management API.
///
/// Every call is a synchronous request/response; a missing resource is
/// reported as an error for which [`AtlasError::is_not_found`] is `true`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AtlasApi: Send + Sync {
    /// Create a database user in a project
    async fn create_database_user(
        &self,
        project_id: &str,
        user: &DatabaseUser,
    ) -> Result<DatabaseUser, AtlasError>;

    /// Fetch a database user
    async fn get_database_user(
        &self,
        project_id: &str,
        username: &str,
    ) -> Result<DatabaseUser, AtlasError>;

    /// Delete a database user
    async fn delete_database_user(&self, project_id: &str, username: &str)
    -> Result<(), AtlasError>;

    /// Create an organization API key
    async fn create_api_key(&self, org_id: &str, input: &ApiKeyInput)
    -> Result<ApiKey, AtlasError>;

    /// Fetch an organization API key
    async fn get_api_key(&self, org_id: &str, key_id: &str) -> Result<ApiKey, AtlasError>;

    /// Delete an organization API key
    async fn delete_api_key(&self, org_id: &str, key_id: &str) -> Result<(), AtlasError>;

    /// List the organization's API keys
    async fn list_api_keys(&self, org_id: &str) -> Result<Vec<ApiKey>, AtlasError>;

    /// Create an API key scoped to a project
    async fn create_project_api_key(
        &self,
        project_id: &str,
        input: &ApiKeyInput,
    ) -> Result<ApiKey, AtlasError>;

    /// Assign an organization key to a project
    async fn assign_project_api_key(
        &self,
        project_id: &str,
        key_id: &str,
        assignment: &AssignApiKey,
    ) -> Result<(), AtlasError>;

    /// Remove a key from a project
    async fn unassign_project_api_key(
        &self,
        project_id: &str,
        key_id: &str,
    ) -> Result<(), AtlasError>;

    /// List the keys assigned to a project
    async fn list_project_api_keys(&self, project_id: &str) -> Result<Vec<ApiKey>, AtlasError>;

    /// Add a network-allow entry for a key
    async fn add_access_list_entry(
        &self,
        org_id: &str,
        key_id: &str,
        entry: &AccessListEntry,
    ) -> Result<(), AtlasError>;
}

/// Builds an authenticated [`AtlasApi`] client from root credentials
pub trait ClientFactory: Send + Sync {
    /// Construct a new client; called at most once per root configuration
    fn build(&self, config: &RootConfig) -> Result<Arc<dyn AtlasApi>, ConfigError>;
}
