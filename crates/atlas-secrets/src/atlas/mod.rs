//! MongoDB Atlas account-management value types.
//!
//! Only the call contract is modeled here ([`AtlasApi`](crate::traits::AtlasApi));
//! the HTTP wire protocol and digest authentication live in whatever client a
//! [`ClientFactory`](crate::traits::ClientFactory) builds. Field names follow
//! the Atlas Admin API JSON.

mod error;

pub use error::AtlasError;

use serde::{Deserialize, Serialize};

use crate::core::SecureString;

/// A database role granted to a database user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRole {
    /// Database the role applies to
    pub database_name: String,
    /// Role name, e.g. `atlasAdmin` or `readWrite`
    pub role_name: String,
    /// Optional collection scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
}

impl DatabaseRole {
    /// Role on a whole database
    pub fn new(database_name: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            role_name: role_name.into(),
            collection_name: None,
        }
    }
}

/// Database user as sent to and returned by Atlas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseUser {
    /// Username
    pub username: String,
    /// Password (only present on create requests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<SecureString>,
    /// Owning project (`groupId` in Atlas)
    #[serde(rename = "groupId")]
    pub project_id: String,
    /// Authentication database
    pub database_name: String,
    /// Granted roles
    pub roles: Vec<DatabaseRole>,
}

/// Request body for API key creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyInput {
    /// Key description; the generated principal name
    pub desc: String,
    /// Organization or project roles
    pub roles: Vec<String>,
}

/// Role held by an API key, with the organization or project it applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRole {
    /// Role name
    pub role_name: String,
    /// Organization the role belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Project the role belongs to
    #[serde(default, rename = "groupId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Programmatic API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    /// Key identifier
    pub id: String,
    /// Description given at creation
    pub desc: String,
    /// Public half of the key pair
    pub public_key: String,
    /// Private half; only returned by the create call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<SecureString>,
    /// Roles held by the key
    #[serde(default)]
    pub roles: Vec<ApiKeyRole>,
}

impl ApiKey {
    /// Organization owning the key, taken from its first role
    pub fn owning_org_id(&self) -> Option<&str> {
        self.roles.first().and_then(|role| role.org_id.as_deref())
    }
}

/// Request body assigning an organization key to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignApiKey {
    /// Project roles granted to the key
    pub roles: Vec<String>,
}

/// Network-allow entry for an API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessListEntry {
    /// Block in CIDR notation
    CidrBlock(String),
    /// Single IP address
    IpAddress(String),
}

impl AccessListEntry {
    /// The address or block as written
    pub fn value(&self) -> &str {
        match self {
            AccessListEntry::CidrBlock(v) | AccessListEntry::IpAddress(v) => v,
        }
    }
}
