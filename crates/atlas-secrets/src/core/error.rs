//! Error types for the Atlas secrets backend
//!
//! This module defines a layered error hierarchy:
//! - [`BackendError`]: top-level error returned by every exposed operation
//! - [`ConfigError`]: root credentials or backend configuration absent/malformed
//! - [`ValidationError`]: rejected input, zero side effects
//! - [`StorageError`]: KV and WAL failures
//! - [`CleanupError`]: the second cause of a failed issuance whose cleanup also failed
//!
//! Remote failures are [`AtlasError`](crate::atlas::AtlasError) and are wrapped
//! with the principal they concern.
//!
//! # Error Conversion Examples
//!
//! ```
//! use atlas_secrets::core::{BackendError, ValidationError};
//!
//! let err: BackendError = ValidationError::EmptyRoleName.into();
//! assert!(err.is_validation());
//! assert!(err.to_string().contains("role name"));
//! ```

use thiserror::Error;

use crate::atlas::AtlasError;

/// Top-level backend error
#[derive(Debug, Error)]
pub enum BackendError {
    /// Root credentials or backend configuration are absent or malformed
    #[error("Configuration error: {source}")]
    Config {
        /// Underlying configuration error
        #[from]
        source: ConfigError,
    },

    /// Input rejected before any persistence change
    #[error("Validation error: {source}")]
    Validation {
        /// Underlying validation error
        #[from]
        source: ValidationError,
    },

    /// A remote create/assign/access-list call failed after the WAL record was written
    #[error("Failed to provision '{principal}': {source}")]
    Provisioning {
        /// Generated principal name
        principal: String,
        /// Remote failure
        #[source]
        source: AtlasError,
    },

    /// Provisioning failed and so did the cleanup that followed it.
    ///
    /// Manual remote cleanup may be required when the cleanup cause is a WAL failure.
    #[error("Failed to provision '{principal}': {provisioning}; cleanup also failed: {cleanup}")]
    ProvisioningCleanup {
        /// Generated principal name
        principal: String,
        /// Original remote failure
        provisioning: AtlasError,
        /// Failure hit while cleaning up
        #[source]
        cleanup: CleanupError,
    },

    /// Deleting or unassigning a remote principal failed
    #[error("Failed to roll back '{principal}': {source}")]
    Rollback {
        /// Principal name or key identifier
        principal: String,
        /// Remote failure
        #[source]
        source: AtlasError,
    },

    /// Underlying KV or WAL failure
    #[error("Storage error: {source}")]
    Storage {
        /// Underlying storage error
        #[from]
        source: StorageError,
    },
}

impl BackendError {
    /// `true` for errors caused by rejected input
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// `true` for configuration errors (no remote call, no WAL write happened)
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// `true` when both a provisioning failure and its cleanup failure are reported
    pub fn is_combined(&self) -> bool {
        matches!(self, Self::ProvisioningCleanup { .. })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No root configuration was ever written
    #[error("Root configuration is missing; write config/root first")]
    RootConfigMissing,

    /// Stored root configuration could not be decoded
    #[error("Root configuration is malformed: {0}")]
    RootConfigMalformed(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// Why it is invalid
        reason: String,
    },

    /// Remote client could not be built from the root configuration
    #[error("Failed to build Atlas client: {0}")]
    ClientBuild(String),
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Role name cannot be empty
    #[error("Missing role name")]
    EmptyRoleName,

    /// Role does not exist
    #[error("Role '{0}' not found")]
    RoleNotFound(String),

    /// Credential type string is not one of the supported kinds
    #[error("Unrecognized credential_type '{0}'")]
    UnknownCredentialType(String),

    /// New roles must name their credential type
    #[error("credential_type is required for a new role")]
    MissingCredentialType,

    /// A field required by the credential type is missing or empty
    #[error("{field} is required for {credential_type}")]
    MissingField {
        /// Missing field name
        field: &'static str,
        /// Credential type requiring it
        credential_type: &'static str,
    },

    /// A field is not accepted for the credential type
    #[error("{field} is not supported for {credential_type}")]
    UnsupportedField {
        /// Rejected field name
        field: &'static str,
        /// Credential type rejecting it
        credential_type: &'static str,
    },

    /// Role TTL is larger than role max TTL
    #[error("ttl ({ttl:?}) exceeds max_ttl ({max_ttl:?})")]
    TtlExceedsMaxTtl {
        /// Requested TTL
        ttl: std::time::Duration,
        /// Requested max TTL
        max_ttl: std::time::Duration,
    },

    /// Database roles could not be parsed
    #[error("Cannot parse db_roles: {0}")]
    InvalidDbRoles(String),

    /// Access-list entry is not a valid IP address or CIDR block
    #[error("Invalid {kind} '{value}'")]
    InvalidAccessListEntry {
        /// `ip_address` or `cidr_block`
        kind: &'static str,
        /// Offending value
        value: String,
    },
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend I/O failure
    #[error("Storage operation '{operation}' failed for '{key}': {reason}")]
    Backend {
        /// Operation name (get, put, delete, list)
        operation: &'static str,
        /// Key or prefix involved
        key: String,
        /// Failure description
        reason: String,
    },

    /// Entry could not be encoded or decoded
    #[error("Failed to (de)serialize entry '{key}': {source}")]
    Serialization {
        /// Key involved
        key: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Shorthand for a backend failure
    pub fn backend(operation: &'static str, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Second cause of a failed issuance
#[derive(Debug, Error)]
pub enum CleanupError {
    /// The WAL record could not be deleted
    #[error("failed to delete WAL entry: {0}")]
    Wal(#[source] StorageError),

    /// The compensating remote delete failed; the WAL record was kept for the sweep
    #[error("failed to delete partially created principal: {0}")]
    Remote(#[source] Box<BackendError>),
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
