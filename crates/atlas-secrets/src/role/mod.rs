//! Role definitions and their persistence
//!
//! A role is the named recipe an issuance follows: credential type,
//! type-specific parameters and optional TTL overrides.

mod definition;
mod store;
mod update;

pub use definition::{CredentialSpec, ROLE_VERSION, RoleDefinition};
pub use store::{ROLE_PREFIX, RoleStore};
pub use update::RoleUpdate;
