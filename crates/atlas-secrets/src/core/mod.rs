//! Core types for the Atlas secrets backend

mod error;
mod kind;
mod secure;

pub use error::{
    BackendError, CleanupError, ConfigError, Result, StorageError, ValidationError,
};
pub use kind::CredentialKind;
pub use secure::SecureString;
