//! Partial role writes

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::RoleDefinition;
use crate::atlas::DatabaseRole;
use crate::core::{CredentialKind, ValidationError};

/// Partial role write. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleUpdate {
    /// Credential type name; required when the role does not exist yet
    pub credential_type: Option<String>,
    /// Target project
    pub project_id: Option<String>,
    /// Target organization
    pub organization_id: Option<String>,
    /// Authentication database
    pub database_name: Option<String>,
    /// Structured database roles
    pub db_roles: Option<Vec<DatabaseRole>>,
    /// Database roles as a JSON document, the form older clients send
    pub db_roles_json: Option<String>,
    /// API key roles
    pub api_key_roles: Option<Vec<String>>,
    /// Project roles for assigned keys
    pub project_roles: Option<Vec<String>>,
    /// Allowed IP addresses
    pub ip_whitelist: Option<Vec<String>>,
    /// Allowed CIDR blocks
    pub cidr_whitelist: Option<Vec<String>>,
    /// Role TTL
    #[serde(with = "humantime_serde")]
    pub ttl: Option<Duration>,
    /// Role max TTL
    #[serde(with = "humantime_serde")]
    pub max_ttl: Option<Duration>,
}

impl RoleUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the credential type
    pub fn credential_type(mut self, kind: impl Into<String>) -> Self {
        self.credential_type = Some(kind.into());
        self
    }

    /// Set the project
    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    /// Set the organization
    pub fn organization_id(mut self, id: impl Into<String>) -> Self {
        self.organization_id = Some(id.into());
        self
    }

    /// Set the authentication database
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Set the database roles
    pub fn db_roles(mut self, roles: Vec<DatabaseRole>) -> Self {
        self.db_roles = Some(roles);
        self
    }

    /// Set the database roles from their JSON text form
    pub fn db_roles_json(mut self, json: impl Into<String>) -> Self {
        self.db_roles_json = Some(json.into());
        self
    }

    /// Set the API key roles
    pub fn api_key_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_key_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Set the project roles
    pub fn project_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Set the allowed IP addresses
    pub fn ip_whitelist<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ip_whitelist = Some(ips.into_iter().map(Into::into).collect());
        self
    }

    /// Set the allowed CIDR blocks
    pub fn cidr_whitelist<I, S>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cidr_whitelist = Some(blocks.into_iter().map(Into::into).collect());
        self
    }

    /// Set the TTL
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the max TTL
    pub fn max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = Some(max_ttl);
        self
    }

    /// Merge onto an existing definition and validate the result.
    ///
    /// Changing the credential type of an existing role starts from a blank
    /// definition of the new type, keeping only the TTLs.
    pub fn apply(self, existing: Option<RoleDefinition>) -> Result<RoleDefinition, ValidationError> {
        let requested = self
            .credential_type
            .as_deref()
            .map(str::parse::<CredentialKind>)
            .transpose()?;

        let mut role = match (existing, requested) {
            (Some(current), Some(kind)) if current.credential_type != kind => RoleDefinition {
                ttl: current.ttl,
                max_ttl: current.max_ttl,
                ..RoleDefinition::new(kind)
            },
            (Some(current), _) => current,
            (None, Some(kind)) => RoleDefinition::new(kind),
            (None, None) => return Err(ValidationError::MissingCredentialType),
        };

        if let Some(id) = self.project_id {
            role.project_id = non_empty(id);
        }
        if let Some(id) = self.organization_id {
            role.organization_id = non_empty(id);
        }
        if let Some(name) = self.database_name {
            role.database_name = non_empty(name);
        }
        if let Some(roles) = self.db_roles {
            role.db_roles = roles;
        }
        // the text form wins when both are given
        if let Some(json) = self.db_roles_json {
            role.db_roles = parse_db_roles(&json)?;
        }
        if let Some(roles) = self.api_key_roles {
            role.api_key_roles = to_set(roles);
        }
        if let Some(roles) = self.project_roles {
            role.project_roles = to_set(roles);
        }
        if let Some(ips) = self.ip_whitelist {
            role.ip_whitelist = to_set(ips);
        }
        if let Some(blocks) = self.cidr_whitelist {
            role.cidr_whitelist = to_set(blocks);
        }
        if let Some(ttl) = self.ttl {
            role.ttl = ttl;
        }
        if let Some(max_ttl) = self.max_ttl {
            role.max_ttl = max_ttl;
        }

        role.validate()?;
        Ok(role)
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn to_set(values: Vec<String>) -> BTreeSet<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn parse_db_roles(json: &str) -> Result<Vec<DatabaseRole>, ValidationError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json).map_err(|e| ValidationError::InvalidDbRoles(e.to_string()))
}
