//! Backend configuration: root credentials, lease overrides and system defaults

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{ConfigError, SecureString, ValidationError};

/// Storage key of the root credentials
pub const ROOT_CONFIG_KEY: &str = "config/root";

/// Storage key of the mount-level lease override
pub const LEASE_CONFIG_KEY: &str = "config/lease";

/// Shortest password the backend will issue
pub const MIN_PASSWORD_LENGTH: usize = 20;

/// Programmatic API key used to authenticate to Atlas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootConfig {
    /// Public half of the programmatic key
    pub public_key: String,
    /// Private half of the programmatic key
    pub private_key: SecureString,
}

impl RootConfig {
    /// Create root credentials
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: SecureString::new(private_key),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.public_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "public_key".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.private_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "private_key".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Mount-level lease override stored at [`LEASE_CONFIG_KEY`].
///
/// Zero fields fall through to [`BackendConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Default lease TTL
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Maximum lease TTL
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,
}

impl LeaseConfig {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if !self.max_ttl.is_zero() && self.ttl > self.max_ttl {
            return Err(ValidationError::TtlExceedsMaxTtl {
                ttl: self.ttl,
                max_ttl: self.max_ttl,
            });
        }
        Ok(())
    }
}

/// Static backend configuration supplied by the host at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// System default lease TTL
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// System maximum lease TTL
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,

    /// WAL records younger than this are never rolled back by the sweep
    #[serde(with = "humantime_serde")]
    pub wal_rollback_min_age: Duration,

    /// Prefix of every generated principal name
    pub username_prefix: String,

    /// Length of generated database passwords
    pub password_length: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            max_ttl: Duration::from_secs(24 * 3600),
            wal_rollback_min_age: Duration::from_secs(5 * 60),
            username_prefix: "vault".into(),
            password_length: 22,
        }
    }
}

impl BackendConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.default_ttl.is_zero() && !self.max_ttl.is_zero() && self.default_ttl > self.max_ttl
        {
            return Err(ConfigError::InvalidValue {
                field: "default_ttl".into(),
                reason: format!("{:?} exceeds max_ttl {:?}", self.default_ttl, self.max_ttl),
            });
        }

        if self.wal_rollback_min_age.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "wal_rollback_min_age".into(),
                reason: "must be positive so in-flight issuances are never rolled back".into(),
            });
        }

        if self.username_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "username_prefix".into(),
                reason: "must not be empty".into(),
            });
        }

        if self.password_length < MIN_PASSWORD_LENGTH {
            return Err(ConfigError::InvalidValue {
                field: "password_length".into(),
                reason: format!("must be at least {MIN_PASSWORD_LENGTH}"),
            });
        }

        Ok(())
    }

    /// System lease defaults, with any nonzero stored override taking precedence
    pub fn lease_defaults(&self, stored: Option<LeaseConfig>) -> LeaseConfig {
        let stored = stored.unwrap_or_default();
        LeaseConfig {
            ttl: if stored.ttl.is_zero() {
                self.default_ttl
            } else {
                stored.ttl
            },
            max_ttl: if stored.max_ttl.is_zero() {
                self.max_ttl
            } else {
                stored.max_ttl
            },
        }
    }
}
