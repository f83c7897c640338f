use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::jwks::Claims;
use crate::directory::{DirectoryError, UserDirectory};

/// Prefix marking an authority derived from a role code.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Permission label attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Authority(String);

impl Authority {
    /// Authority for a role code, e.g. `user` -> `ROLE_USER`.
    pub fn from_role_code(code: &str) -> Self {
        Authority(format!("{}{}", ROLE_PREFIX, code.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the authorities of a verified token from the local directory.
///
/// Re-read on every request so role changes apply immediately. A token
/// without `sub`, a subject with no local user, and a user without a role
/// all resolve to the empty set; incomplete profiles are stopped by the
/// profile gate, not here.
pub fn resolve_authorities(
    directory: &dyn UserDirectory,
    claims: &Claims,
) -> Result<BTreeSet<Authority>, DirectoryError> {
    let Some(subject) = claims.sub.as_deref() else {
        return Ok(BTreeSet::new());
    };

    let Some(user) = directory.find_by_external_id(subject)? else {
        return Ok(BTreeSet::new());
    };

    match user.role {
        Some(role) if !role.code.is_empty() => {
            Ok(BTreeSet::from([Authority::from_role_code(&role.code)]))
        }
        _ => {
            tracing::debug!("User {} has no role; granting no authorities", user.id);
            Ok(BTreeSet::new())
        }
    }
}
