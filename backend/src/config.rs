//! Application configuration.

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;

pub use config::ConfigError;

/// Application configuration loaded from `config.toml` and environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
    pub oidc: OidcConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub roles: RolesConfig,
}

/// Identity provider settings used to verify bearer tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    /// Issuer URL; tokens must carry exactly this `iss`.
    pub issuer: String,
    /// Expected `aud`. Audience is not validated when unset.
    #[serde(default)]
    pub audience: Option<String>,
    /// Explicit JWKS endpoint. Discovered from the issuer when unset.
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database URL (`sqlite:` prefix optional, `:memory:` allowed)
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// `*` or a comma-separated list of origins.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

impl CorsConfig {
    /// Explicit origins, or `None` when any origin is allowed.
    pub fn origin_list(&self) -> Option<Vec<String>> {
        if self.origins.trim() == "*" {
            return None;
        }
        Some(
            self.origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        )
    }
}

/// Role bookkeeping for newly created users.
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    /// Role code assigned to every new profile.
    #[serde(default = "default_role_code")]
    pub default_code: String,
    /// Role codes inserted at startup if missing.
    #[serde(default = "default_seed_roles")]
    pub seed: Vec<String>,
    /// Refuse to start when the default role is absent.
    #[serde(default = "default_true")]
    pub verify_on_startup: bool,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            default_code: default_role_code(),
            seed: default_seed_roles(),
            verify_on_startup: default_true(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_database_url() -> String {
    "sqlite:./data/accounts.db".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}
fn default_role_code() -> String {
    "USER".to_string()
}
fn default_seed_roles() -> Vec<String> {
    vec![default_role_code()]
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (ACCOUNTS__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("ACCOUNTS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("roles.seed")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Address the HTTP listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
