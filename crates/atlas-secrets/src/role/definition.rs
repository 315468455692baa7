//! Role definitions and their per-type validation

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::atlas::{AccessListEntry, DatabaseRole};
use crate::core::{CredentialKind, ValidationError};

/// Current persisted layout of [`RoleDefinition`]
pub const ROLE_VERSION: u32 = 1;

const fn role_version() -> u32 {
    ROLE_VERSION
}

/// A named recipe for issuing one kind of credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Persisted layout version
    #[serde(default = "role_version")]
    pub version: u32,

    /// Kind of credential issued
    pub credential_type: CredentialKind,

    /// Target project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Target organization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Authentication database of issued database users
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,

    /// Roles granted to issued database users, in order
    #[serde(default)]
    pub db_roles: Vec<DatabaseRole>,

    /// Roles granted to issued API keys
    #[serde(default)]
    pub api_key_roles: BTreeSet<String>,

    /// Project roles granted when an organization key is assigned to a project
    #[serde(default)]
    pub project_roles: BTreeSet<String>,

    /// IP addresses allowed to use issued API keys
    #[serde(default)]
    pub ip_whitelist: BTreeSet<String>,

    /// CIDR blocks allowed to use issued API keys
    #[serde(default)]
    pub cidr_whitelist: BTreeSet<String>,

    /// Role TTL override; zero falls back to system defaults
    #[serde(default, with = "humantime_serde")]
    pub ttl: Duration,

    /// Role max TTL override; zero falls back to system defaults
    #[serde(default, with = "humantime_serde")]
    pub max_ttl: Duration,
}

impl RoleDefinition {
    /// Empty role of the given kind
    pub fn new(credential_type: CredentialKind) -> Self {
        Self {
            version: ROLE_VERSION,
            credential_type,
            project_id: None,
            organization_id: None,
            database_name: None,
            db_roles: Vec::new(),
            api_key_roles: BTreeSet::new(),
            project_roles: BTreeSet::new(),
            ip_whitelist: BTreeSet::new(),
            cidr_whitelist: BTreeSet::new(),
            ttl: Duration::ZERO,
            max_ttl: Duration::ZERO,
        }
    }

    /// Check every invariant a stored role must satisfy
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.ttl.is_zero() && !self.max_ttl.is_zero() && self.ttl > self.max_ttl {
            return Err(ValidationError::TtlExceedsMaxTtl {
                ttl: self.ttl,
                max_ttl: self.max_ttl,
            });
        }

        let allowed = allowed_fields(self.credential_type);
        if let Some(field) = self
            .present_fields()
            .into_iter()
            .find(|field| !allowed.contains(field))
        {
            return Err(ValidationError::UnsupportedField {
                field,
                credential_type: self.credential_type.as_str(),
            });
        }

        for ip in &self.ip_whitelist {
            if ip.parse::<IpAddr>().is_err() {
                return Err(ValidationError::InvalidAccessListEntry {
                    kind: "ip_address",
                    value: ip.clone(),
                });
            }
        }
        for block in &self.cidr_whitelist {
            if !is_cidr(block) {
                return Err(ValidationError::InvalidAccessListEntry {
                    kind: "cidr_block",
                    value: block.clone(),
                });
            }
        }

        self.spec().map(|_| ())
    }

    /// Typed view of the type-specific parameters, checking required fields
    pub fn spec<'a>(&'a self) -> Result<CredentialSpec<'a>, ValidationError> {
        let kind = self.credential_type;
        let require = |value: &'a Option<String>, field| require_str(value, field, kind);
        let require_roles = |roles: &BTreeSet<String>, field| require_set(roles, field, kind);

        Ok(match kind {
            CredentialKind::DatabaseUser => {
                let project_id = require(&self.project_id, "project_id")?;
                let database_name = require(&self.database_name, "database_name")?;
                if self.db_roles.is_empty() {
                    return Err(ValidationError::MissingField {
                        field: "db_roles",
                        credential_type: kind.as_str(),
                    });
                }
                CredentialSpec::DatabaseUser {
                    project_id,
                    database_name,
                    roles: &self.db_roles,
                }
            }
            CredentialKind::OrgApiKey => CredentialSpec::OrgApiKey {
                organization_id: require(&self.organization_id, "organization_id")?,
                roles: require_roles(&self.api_key_roles, "api_key_roles")?,
            },
            CredentialKind::ProjectApiKey => CredentialSpec::ProjectApiKey {
                project_id: require(&self.project_id, "project_id")?,
                roles: require_roles(&self.api_key_roles, "api_key_roles")?,
            },
            CredentialKind::ProjectAssignedApiKey => CredentialSpec::ProjectAssignedApiKey {
                organization_id: require(&self.organization_id, "organization_id")?,
                project_id: require(&self.project_id, "project_id")?,
                roles: require_roles(&self.api_key_roles, "api_key_roles")?,
                project_roles: require_roles(&self.project_roles, "project_roles")?,
            },
        })
    }

    /// Network-allow entries to attach to issued keys, CIDR blocks first
    pub fn access_list(&self) -> Vec<AccessListEntry> {
        self.cidr_whitelist
            .iter()
            .cloned()
            .map(AccessListEntry::CidrBlock)
            .chain(self.ip_whitelist.iter().cloned().map(AccessListEntry::IpAddress))
            .collect()
    }

    fn present_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("project_id", self.project_id.is_some()),
            ("organization_id", self.organization_id.is_some()),
            ("database_name", self.database_name.is_some()),
            ("db_roles", !self.db_roles.is_empty()),
            ("api_key_roles", !self.api_key_roles.is_empty()),
            ("project_roles", !self.project_roles.is_empty()),
            ("ip_whitelist", !self.ip_whitelist.is_empty()),
            ("cidr_whitelist", !self.cidr_whitelist.is_empty()),
        ];
        checks
            .into_iter()
            .filter_map(|(field, present)| present.then_some(field))
            .collect()
    }
}

/// Type-specific issuance parameters, borrowed from a validated role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSpec<'a> {
    /// Database user in a project
    DatabaseUser {
        /// Target project
        project_id: &'a str,
        /// Authentication database
        database_name: &'a str,
        /// Granted roles
        roles: &'a [DatabaseRole],
    },
    /// Organization API key
    OrgApiKey {
        /// Owning organization
        organization_id: &'a str,
        /// Organization roles
        roles: Vec<String>,
    },
    /// Project API key; the owning organization comes from the create response
    ProjectApiKey {
        /// Target project
        project_id: &'a str,
        /// Project roles
        roles: Vec<String>,
    },
    /// Organization API key assigned to a project
    ProjectAssignedApiKey {
        /// Owning organization
        organization_id: &'a str,
        /// Project the key is assigned to
        project_id: &'a str,
        /// Organization roles
        roles: Vec<String>,
        /// Project roles granted by the assignment
        project_roles: Vec<String>,
    },
}

fn require_str<'a>(
    value: &'a Option<String>,
    field: &'static str,
    kind: CredentialKind,
) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField {
            field,
            credential_type: kind.as_str(),
        })
}

fn require_set(
    values: &BTreeSet<String>,
    field: &'static str,
    kind: CredentialKind,
) -> Result<Vec<String>, ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::MissingField {
            field,
            credential_type: kind.as_str(),
        });
    }
    Ok(values.iter().cloned().collect())
}

fn allowed_fields(kind: CredentialKind) -> &'static [&'static str] {
    match kind {
        CredentialKind::DatabaseUser => &["project_id", "database_name", "db_roles"],
        CredentialKind::OrgApiKey => &[
            "organization_id",
            "api_key_roles",
            "ip_whitelist",
            "cidr_whitelist",
        ],
        CredentialKind::ProjectApiKey => &[
            "project_id",
            "api_key_roles",
            "ip_whitelist",
            "cidr_whitelist",
        ],
        CredentialKind::ProjectAssignedApiKey => &[
            "organization_id",
            "project_id",
            "api_key_roles",
            "project_roles",
            "ip_whitelist",
            "cidr_whitelist",
        ],
    }
}

fn is_cidr(block: &str) -> bool {
    let Some((addr, prefix)) = block.split_once('/') else {
        return false;
    };
    let (Ok(addr), Ok(prefix)) = (addr.parse::<IpAddr>(), prefix.parse::<u8>()) else {
        return false;
    };
    match addr {
        IpAddr::V4(_) => prefix <= 32,
        IpAddr::V6(_) => prefix <= 128,
    }
}
