use std::collections::BTreeSet;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::authority::Authority;
use super::jwks::Claims;
use crate::error::AppError;

/// Request-scoped result of bearer authentication.
///
/// Inserted into request extensions by the authentication middleware and
/// dropped with the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub authorities: BTreeSet<Authority>,
}

impl AuthContext {
    pub fn new(claims: Claims, authorities: BTreeSet<Authority>) -> Self {
        Self { claims, authorities }
    }

    /// Subject claim, the join key into the user directory.
    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.claims.email.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::AuthenticationRequired)
    }
}
