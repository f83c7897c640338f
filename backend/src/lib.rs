pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod models;
pub mod profile;
pub mod routes;
pub mod test_util;

pub use auth::{AuthContext, JwksClient, TokenVerifier};
pub use config::Config;
pub use directory::{SqliteDirectory, UserDirectory};
pub use error::AppError;
pub use profile::ProfileService;

use std::sync::Arc;

use auth::{AccessRules, PROFILE_SETUP_PATH};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Bearer token verifier (JWKS-backed in production).
    pub verifier: Arc<dyn TokenVerifier>,
    /// Local user and role store.
    pub directory: Arc<dyn UserDirectory>,
    pub profiles: ProfileService,
    /// Route access table consulted after the profile gate.
    pub rules: AccessRules,
}

impl AppState {
    pub fn new(
        config: Config,
        verifier: Arc<dyn TokenVerifier>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let profiles = ProfileService::new(directory.clone(), config.roles.default_code.clone());
        Self {
            config,
            verifier,
            directory,
            profiles,
            rules: AccessRules::standard(PROFILE_SETUP_PATH),
        }
    }
}
