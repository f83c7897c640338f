use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::authority::resolve_authorities;
use super::context::AuthContext;
use super::rules::Access;
use crate::error::AppError;
use crate::AppState;

/// Bearer token from the Authorization header.
///
/// A missing header or a non-Bearer scheme yields `None`: the request is
/// anonymous rather than malformed.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify the bearer token (if any), resolve authorities, and attach an
/// [`AuthContext`] to the request.
///
/// An invalid token is rejected with 401 even on public routes.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(request.headers()).map(str::to_owned) else {
        return next.run(request).await;
    };

    let claims = match state.verifier.verify(&token).await {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("Bearer token rejected: {}", e);
            return AppError::InvalidToken.into_response();
        }
    };

    let authorities = match resolve_authorities(state.directory.as_ref(), &claims) {
        Ok(authorities) => authorities,
        Err(e) => {
            tracing::error!("Failed to resolve authorities: {}", e);
            return AppError::Internal(e.to_string()).into_response();
        }
    };

    tracing::debug!(
        sub = claims.sub.as_deref().unwrap_or("-"),
        authorities = authorities.len(),
        "Authenticated request"
    );

    request
        .extensions_mut()
        .insert(AuthContext::new(claims, authorities));
    next.run(request).await
}

/// Apply the access rule table to the (already authenticated) request.
pub async fn enforce_access(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let access = state.rules.evaluate(request.method(), request.uri().path());

    if access == Access::Authenticated && request.extensions().get::<AuthContext>().is_none() {
        return AppError::AuthenticationRequired.into_response();
    }

    next.run(request).await
}
