//! Lease renewal.
//!
//! Renewal re-resolves the lease from the role and system configuration as
//! they are now, not as they were at issuance. It never touches Atlas.

use std::time::Duration;

use tracing::debug;

use crate::config::LeaseConfig;
use crate::lease::resolve_with;
use crate::role::RoleDefinition;
use crate::secret::IssuedSecret;

/// Re-stamp `secret` with a freshly resolved lease.
///
/// `role` is `None` when the issuing role has been deleted; system defaults
/// then apply alone.
pub fn renew(
    mut secret: IssuedSecret,
    role: Option<&RoleDefinition>,
    defaults: LeaseConfig,
) -> IssuedSecret {
    let (ttl, max_ttl) = role.map_or((Duration::ZERO, Duration::ZERO), |r| (r.ttl, r.max_ttl));
    let lease = resolve_with(ttl, max_ttl, defaults);

    debug!(
        principal = secret.principal(),
        role = %secret.internal.role_name,
        role_found = role.is_some(),
        ttl = ?lease.ttl,
        max_ttl = ?lease.max_ttl,
        "Lease renewed"
    );
    secret.lease = lease;
    secret
}
