//! Atlas Secrets - dynamic MongoDB Atlas credentials
//!
//! Issues short-lived database users and programmatic API keys on demand,
//! leases them, and removes them again on revocation.
//!
//! # Features
//!
//! - **Four credential kinds** - database users, organization keys, project keys
//!   and organization keys assigned to a project
//! - **At most one orphan** - every issuance is bracketed by a write-ahead record,
//!   with compensating deletes and a crash-recovery sweep
//! - **Idempotent rollback** - principals that are already gone count as removed
//! - **Configuration-driven leases** - renewal re-resolves TTLs from current role
//!   and system settings without touching Atlas
//!
//! The HTTP client is supplied by the host through [`ClientFactory`]; this crate
//! owns only the call contract ([`AtlasApi`]).
#![forbid(unsafe_code)]

/// Remote API value types and errors
pub mod atlas;
/// Host-facing backend facade
pub mod backend;
/// Backend and persisted configuration
pub mod config;
/// Core types and errors
pub mod core;
/// Issuance engine, principal names and passwords
pub mod issue;
/// Lease resolution
pub mod lease;
/// Lease renewal
pub mod renew;
/// Rollback routine and stale-record sweep
pub mod revoke;
/// Role definitions and persistence
pub mod role;
/// Issued secrets and provisioning records
pub mod secret;
/// Storage implementations
pub mod storage;
/// Collaborator traits
pub mod traits;
/// Cached Atlas client
pub mod transport;

/// In-memory Atlas and other test doubles
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// ── Root re-exports ─────────────────────────────────────────────────────────

pub use crate::backend::{AtlasBackend, AtlasBackendBuilder};
pub use crate::config::{BackendConfig, LeaseConfig, RootConfig};
pub use crate::core::{
    BackendError, CleanupError, ConfigError, CredentialKind, Result, SecureString, StorageError,
    ValidationError,
};
pub use crate::lease::Lease;
pub use crate::revoke::SweepReport;
pub use crate::role::{RoleDefinition, RoleUpdate};
pub use crate::secret::{InternalData, IssuedSecret, ProvisioningRecord, PublicData};
pub use crate::traits::{AtlasApi, ClientFactory, Storage, WriteAheadLog};

/// Commonly used types and traits
pub mod prelude {
    pub use crate::atlas::{AtlasError, DatabaseRole};
    pub use crate::backend::AtlasBackend;
    pub use crate::config::{BackendConfig, LeaseConfig, RootConfig};
    pub use crate::core::{BackendError, CleanupError, CredentialKind, SecureString};
    pub use crate::lease::Lease;
    pub use crate::revoke::SweepReport;
    pub use crate::role::{RoleDefinition, RoleUpdate};
    pub use crate::secret::{IssuedSecret, ProvisioningRecord, PublicData};
    pub use crate::storage::{MemoryStorage, StorageWal};
    pub use crate::traits::{AtlasApi, ClientFactory, Storage, WriteAheadLog};
}
