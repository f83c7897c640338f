//! Fakes and fixtures shared by unit and integration tests.

mod memory_directory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::auth::{AuthError, Claims, TokenVerifier};
use crate::config::{Config, CorsConfig, DatabaseConfig, LoggingConfig, OidcConfig, RolesConfig};
use crate::directory::UserDirectory;
use crate::AppState;

pub use memory_directory::InMemoryDirectory;

pub const TEST_ISSUER: &str = "https://test-issuer/";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        oidc: OidcConfig {
            issuer: TEST_ISSUER.to_string(),
            audience: None,
            jwks_uri: None,
        },
        database: DatabaseConfig {
            url: ":memory:".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
        roles: RolesConfig::default(),
    }
}

/// Claims as a verifier would return them for a one-hour token.
pub fn claims_for(sub: &str, email: Option<&str>) -> Claims {
    Claims {
        sub: Some(sub.to_string()),
        email: email.map(String::from),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as u64,
        iss: Some(TEST_ISSUER.to_string()),
        extra: serde_json::Map::new(),
    }
}

/// Verifier accepting a fixed set of opaque tokens.
#[derive(Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, Claims>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, claims: Claims) -> Self {
        self.tokens.insert(token.to_string(), claims);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown test token".to_string()))
    }
}

/// Application state over the given fakes.
pub fn test_state(
    verifier: impl TokenVerifier + 'static,
    directory: Arc<dyn UserDirectory>,
) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), Arc::new(verifier), directory))
}
