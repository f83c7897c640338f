use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

const JWKS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const JWKS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default minimum time between key set fetches triggered by unknown `kid`s.
pub const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(10);

/// Verified token claims.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Every other claim in the token.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetchError(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
}

/// Verifies bearer tokens against an identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Check signature and expiry, returning the token's claims.
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: Option<String>,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OidcConfig {
    jwks_uri: String,
}

/// Client for fetching and caching the issuer's JWKS keys.
pub struct JwksClient {
    http_client: Client,
    jwks_uri: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: Mutex<Option<Instant>>,
    refresh_cooldown: Duration,
    issuer: String,
    audience: Option<String>,
}

impl JwksClient {
    /// Build a client for a known JWKS endpoint. Keys are fetched on first use.
    pub fn new(issuer: &str, audience: Option<&str>, jwks_uri: &str) -> Result<Self, AuthError> {
        let http_client = Client::builder()
            .connect_timeout(JWKS_CONNECT_TIMEOUT)
            .timeout(JWKS_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        Ok(Self {
            http_client,
            jwks_uri: jwks_uri.to_string(),
            keys: RwLock::new(HashMap::new()),
            last_refresh: Mutex::new(None),
            refresh_cooldown: JWKS_REFRESH_COOLDOWN,
            issuer: issuer.to_string(),
            audience: audience.map(String::from),
        })
    }

    /// Discover the JWKS endpoint from the issuer's OpenID configuration and
    /// load the initial key set.
    pub async fn discover(issuer: &str, audience: Option<&str>) -> Result<Self, AuthError> {
        let mut client = Self::new(issuer, audience, "")?;

        let config_url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        let config: OidcConfig = client
            .http_client
            .get(&config_url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        client.jwks_uri = config.jwks_uri;
        *client.last_refresh.get_mut() = Some(Instant::now());
        client.refresh_keys().await?;

        Ok(client)
    }

    /// Override the minimum interval between refreshes on unknown `kid`s.
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    async fn refresh_keys(&self) -> Result<usize, AuthError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let mut fresh = HashMap::new();
        for jwk in response.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (&jwk.kid, &jwk.n, &jwk.e) else {
                continue;
            };
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    fresh.insert(kid.clone(), key);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse RSA key {}: {}", kid, e);
                }
            }
        }

        let count = fresh.len();
        *self.keys.write().await = fresh;

        tracing::info!("Loaded {} JWKS keys", count);
        Ok(count)
    }

    /// Look up a key, refreshing the key set once if `kid` is unknown.
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        // Held across check and fetch so concurrent misses share one refresh.
        let mut last_refresh = self.last_refresh.lock().await;

        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        let cooling_down = last_refresh.is_some_and(|at| at.elapsed() < self.refresh_cooldown);
        if !cooling_down {
            *last_refresh = Some(Instant::now());
            self.refresh_keys().await?;
        }
        drop(last_refresh);

        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

#[async_trait]
impl TokenVerifier for JwksClient {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Missing kid in token header".to_string()))?;

        let key = self.key_for(&kid).await?;

        let token_data = decode::<Claims>(token, &key, &self.validation())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_keep_unknown_fields() {
        let json = r#"{
            "sub": "auth0|123",
            "email": "a@x.com",
            "exp": 1700000000,
            "iss": "https://id.example.com/",
            "aud": "api",
            "iat": 1699990000
        }"#;
        let claims: Claims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("auth0|123"));
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.iss.as_deref(), Some("https://id.example.com/"));
        assert_eq!(claims.extra["aud"], "api");
        assert_eq!(claims.extra["iat"], 1699990000);
    }

    #[test]
    fn test_claims_without_subject() {
        let claims: Claims = serde_json::from_str(r#"{"exp": 1}"#).unwrap();
        assert!(claims.sub.is_none());
        assert!(claims.email.is_none());
        assert!(claims.extra.is_empty());
    }

    #[test]
    fn test_validation_skips_audience_when_unset() {
        let client = JwksClient::new("https://id.example.com/", None, "https://id.example.com/jwks").unwrap();
        let validation = client.validation();
        assert!(!validation.validate_aud);
        assert!(validation.validate_exp);
    }

    #[test]
    fn test_validation_checks_configured_audience() {
        let client =
            JwksClient::new("https://id.example.com/", Some("api"), "https://id.example.com/jwks").unwrap();
        let validation = client.validation();
        assert!(validation.validate_aud);
        assert!(validation.aud.unwrap().contains("api"));
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected_without_fetch() {
        let client = JwksClient::new("https://id.example.com/", None, "http://127.0.0.1:9/jwks").unwrap();
        let err = client.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_unreachable_jwks_fails_closed() {
        let client = JwksClient::new("https://id.example.com/", None, "http://127.0.0.1:9/jwks").unwrap();
        // header {"alg":"RS256","kid":"k1"}, payload {"sub":"x","exp":1}
        let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6ImsxIn0.eyJzdWIiOiJ4IiwiZXhwIjoxfQ.c2ln";
        let err = client.verify(token).await.unwrap_err();
        assert!(matches!(err, AuthError::JwksFetchError(_)));
    }

    #[test]
    fn test_auth_error_messages() {
        assert!(AuthError::InvalidToken("bad".to_string())
            .to_string()
            .contains("Invalid token"));
        assert!(AuthError::JwksFetchError("refused".to_string())
            .to_string()
            .contains("JWKS fetch error"));
        assert!(AuthError::KeyNotFound("kid123".to_string())
            .to_string()
            .contains("Key not found for kid"));
    }
}
