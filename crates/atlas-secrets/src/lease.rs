//! Lease resolution.
//!
//! Role-write time rejects `ttl > max_ttl`; issuance and renewal time clamp
//! instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LeaseConfig;

/// TTL pair attached to an issued secret
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Time until renewal is required
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Hard upper bound on the secret's lifetime
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,
}

/// Compute the effective lease from role overrides and system defaults.
///
/// Zero role values fall back to the system values; the resulting TTL is
/// clamped to the resulting max TTL.
///
/// ```
/// use atlas_secrets::lease::resolve;
/// use std::time::Duration;
///
/// let s = Duration::from_secs;
/// let lease = resolve(s(90), Duration::ZERO, s(30), s(60));
/// assert_eq!((lease.ttl, lease.max_ttl), (s(60), s(60)));
/// ```
pub fn resolve(
    role_ttl: Duration,
    role_max_ttl: Duration,
    system_default_ttl: Duration,
    system_max_ttl: Duration,
) -> Lease {
    let max_ttl = if role_max_ttl.is_zero() {
        system_max_ttl
    } else {
        role_max_ttl
    };
    let ttl = if role_ttl.is_zero() {
        system_default_ttl
    } else {
        role_ttl
    };

    Lease {
        ttl: ttl.min(max_ttl),
        max_ttl,
    }
}

/// [`resolve`] against a set of system defaults
pub fn resolve_with(role_ttl: Duration, role_max_ttl: Duration, defaults: LeaseConfig) -> Lease {
    resolve(role_ttl, role_max_ttl, defaults.ttl, defaults.max_ttl)
}
