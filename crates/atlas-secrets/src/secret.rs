//! Issued secrets and the provisioning records that travel with them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{CredentialKind, SecureString};
use crate::lease::Lease;

/// Everything needed to remove a remote principal later.
///
/// The same record is written to the WAL before provisioning and kept as
/// the secret's internal data afterwards, so the sweep and revocation share
/// one rollback path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "credential_type", rename_all = "snake_case")]
pub enum ProvisioningRecord {
    /// Database user
    DatabaseUser {
        /// Generated username
        username: String,
        /// Owning project
        project_id: String,
    },
    /// Organization API key
    OrgApiKey {
        /// Generated key description
        description: String,
        /// Owning organization
        organization_id: String,
        /// Key identifier once known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_id: Option<String>,
    },
    /// Project API key
    ProjectApiKey {
        /// Generated key description
        description: String,
        /// Project the key was created in
        project_id: String,
        /// Key identifier once known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_id: Option<String>,
    },
    /// Organization API key assigned to a project
    ProjectAssignedApiKey {
        /// Generated key description
        description: String,
        /// Owning organization
        organization_id: String,
        /// Project the key is assigned to
        project_id: String,
        /// Key identifier once known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_id: Option<String>,
    },
}

impl ProvisioningRecord {
    /// Kind of principal this record describes
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::DatabaseUser { .. } => CredentialKind::DatabaseUser,
            Self::OrgApiKey { .. } => CredentialKind::OrgApiKey,
            Self::ProjectApiKey { .. } => CredentialKind::ProjectApiKey,
            Self::ProjectAssignedApiKey { .. } => CredentialKind::ProjectAssignedApiKey,
        }
    }

    /// Generated username or key description
    pub fn principal(&self) -> &str {
        match self {
            Self::DatabaseUser { username, .. } => username,
            Self::OrgApiKey { description, .. }
            | Self::ProjectApiKey { description, .. }
            | Self::ProjectAssignedApiKey { description, .. } => description,
        }
    }

    /// Key identifier, when the record is for an API key whose id is known
    pub fn key_id(&self) -> Option<&str> {
        match self {
            Self::DatabaseUser { .. } => None,
            Self::OrgApiKey { key_id, .. }
            | Self::ProjectApiKey { key_id, .. }
            | Self::ProjectAssignedApiKey { key_id, .. } => key_id.as_deref(),
        }
    }

    /// Same record with the key identifier filled in
    pub fn with_key_id(mut self, id: impl Into<String>) -> Self {
        match &mut self {
            Self::DatabaseUser { .. } => {}
            Self::OrgApiKey { key_id, .. }
            | Self::ProjectApiKey { key_id, .. }
            | Self::ProjectAssignedApiKey { key_id, .. } => *key_id = Some(id.into()),
        }
        self
    }
}

/// Credentials handed to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublicData {
    /// Database user credentials
    DatabaseUser {
        /// Username
        username: String,
        /// Password
        password: SecureString,
    },
    /// API key pair
    ApiKey {
        /// Public half
        public_key: String,
        /// Private half
        private_key: SecureString,
        /// Key description; the generated principal name
        description: String,
    },
}

/// Data kept with the lease and never shown to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalData {
    /// Role the secret was issued from, used to re-resolve the lease on renewal
    pub role_name: String,
    /// How to remove the principal
    pub record: ProvisioningRecord,
}

/// A provisioned credential with its lease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedSecret {
    /// Caller-visible credentials
    pub public: PublicData,
    /// Rollback data
    pub internal: InternalData,
    /// Current lease
    pub lease: Lease,
    /// Issuance time
    pub issued_at: DateTime<Utc>,
}

impl IssuedSecret {
    /// Kind of credential
    pub fn kind(&self) -> CredentialKind {
        self.internal.record.kind()
    }

    /// Generated username or key description
    pub fn principal(&self) -> &str {
        self.internal.record.principal()
    }
}
