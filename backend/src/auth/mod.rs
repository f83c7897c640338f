//! Bearer authentication and authorization.
//!
//! Request pipeline, outermost first:
//! 1. [`middleware::authenticate`] verifies the bearer token and resolves
//!    authorities into an [`AuthContext`].
//! 2. [`gate::profile_completion`] rejects incomplete profiles.
//! 3. [`middleware::enforce_access`] applies the [`AccessRules`] table.

pub mod authority;
pub mod context;
pub mod gate;
pub mod jwks;
pub mod middleware;
pub mod rules;

pub use authority::{resolve_authorities, Authority};
pub use context::AuthContext;
pub use gate::PROFILE_SETUP_PATH;
pub use jwks::{AuthError, Claims, JwksClient, TokenVerifier};
pub use rules::{Access, AccessRule, AccessRules};
