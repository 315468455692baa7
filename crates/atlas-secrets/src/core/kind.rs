//! Credential kinds issued by the backend

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// The closed set of credential types a role can issue.
///
/// Issuance, rollback and the WAL record all dispatch on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Database user with a generated password
    DatabaseUser,
    /// Organization-scoped programmatic API key
    OrgApiKey,
    /// Project-scoped programmatic API key
    ProjectApiKey,
    /// Organization API key assigned to a project
    ProjectAssignedApiKey,
}

impl CredentialKind {
    /// All kinds, in declaration order
    pub const ALL: [CredentialKind; 4] = [
        CredentialKind::DatabaseUser,
        CredentialKind::OrgApiKey,
        CredentialKind::ProjectApiKey,
        CredentialKind::ProjectAssignedApiKey,
    ];

    /// Wire name used in role definitions and WAL records
    pub const fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::DatabaseUser => "database_user",
            CredentialKind::OrgApiKey => "org_api_key",
            CredentialKind::ProjectApiKey => "project_api_key",
            CredentialKind::ProjectAssignedApiKey => "project_assigned_api_key",
        }
    }

    /// Whether this kind issues a programmatic API key
    pub const fn is_api_key(&self) -> bool {
        !matches!(self, CredentialKind::DatabaseUser)
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCredentialType(s.to_string()))
    }
}
