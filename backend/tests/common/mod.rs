//! Mock identity provider and request helpers for integration tests.
#![allow(dead_code)]

use std::sync::OnceLock;

use axum::body::Body;
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use http::{header, Method, Request, StatusCode};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::LineEnding;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const KID: &str = "test-key";

/// RSA key pair with its JWK representation.
pub struct TestKeyPair {
    pub kid: String,
    pub encoding_key: EncodingKey,
    pub n_b64: String,
    pub e_b64: String,
}

impl TestKeyPair {
    pub fn generate(kid: &str) -> Self {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate RSA key");

        let pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("failed to encode private key");
        let encoding_key =
            EncodingKey::from_rsa_pem(pem.as_bytes()).expect("failed to create encoding key");

        let public_key = private_key.to_public_key();
        TestKeyPair {
            kid: kid.to_string(),
            encoding_key,
            n_b64: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e_b64: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "alg": "RS256",
            "use": "sig",
            "n": self.n_b64,
            "e": self.e_b64,
        })
    }
}

/// Key generation is slow in debug builds; share keys across tests.
pub fn signing_key() -> &'static TestKeyPair {
    static KEY: OnceLock<TestKeyPair> = OnceLock::new();
    KEY.get_or_init(|| TestKeyPair::generate(KID))
}

pub fn rogue_key() -> &'static TestKeyPair {
    static KEY: OnceLock<TestKeyPair> = OnceLock::new();
    KEY.get_or_init(|| TestKeyPair::generate(KID))
}

/// Wiremock-backed OIDC provider publishing [`signing_key`].
pub struct MockIdp {
    pub server: MockServer,
}

impl MockIdp {
    /// Serve discovery and JWKS without call-count expectations.
    pub async fn start() -> Self {
        let idp = Self::start_bare().await;
        idp.mount_discovery().await;
        idp.mount_jwks(None).await;
        idp
    }

    pub async fn start_bare() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}/.well-known/jwks.json", self.server.uri())
    }

    pub async fn mount_discovery(&self) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": self.issuer(),
                "jwks_uri": self.jwks_uri(),
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve the JWKS, optionally asserting how many times it is fetched.
    pub async fn mount_jwks(&self, expected_calls: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [signing_key().jwk()]
            })));
        let mock = match expected_calls {
            Some(n) => mock.expect(n),
            None => mock,
        };
        mock.mount(&self.server).await;
    }

    pub fn claims(&self, sub: &str, email: Option<&str>) -> Value {
        let now = Utc::now();
        let mut claims = json!({
            "sub": sub,
            "iss": self.issuer(),
            "aud": "accounts-api",
            "iat": now.timestamp(),
            "exp": (now + Duration::hours(1)).timestamp(),
        });
        if let Some(email) = email {
            claims["email"] = json!(email);
        }
        claims
    }

    pub fn token(&self, sub: &str, email: Option<&str>) -> String {
        sign(&self.claims(sub, email), signing_key())
    }

    pub fn expired_token(&self, sub: &str) -> String {
        let now = Utc::now();
        let mut claims = self.claims(sub, None);
        claims["iat"] = json!((now - Duration::hours(2)).timestamp());
        claims["exp"] = json!((now - Duration::hours(1)).timestamp());
        sign(&claims, signing_key())
    }
}

pub fn sign(claims: &Value, key: &TestKeyPair) -> String {
    let header = Header {
        alg: Algorithm::RS256,
        kid: Some(key.kid.clone()),
        ..Default::default()
    };
    jsonwebtoken::encode(&header, claims, &key.encoding_key).expect("Failed to encode JWT")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Value,
}

/// Send one request through the router. Non-JSON bodies come back as strings.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    TestResponse {
        status,
        content_type,
        body,
    }
}
