//! Profile completion gate.
//!
//! Runs once per request after bearer authentication. Token-authenticated
//! callers whose local profile is missing or incomplete are rejected with
//! `403 PROFILE_SETUP_REQUIRED`, except on the profile setup endpoint itself.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::context::AuthContext;
use crate::directory::{DirectoryError, UserDirectory};
use crate::error::AppError;
use crate::AppState;

/// Route where incomplete users create their profile.
pub const PROFILE_SETUP_PATH: &str = "/api/users/profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Forward,
    ProfileSetupRequired,
}

/// POST or PUT on the profile setup path.
pub fn is_profile_setup_request(method: &Method, path: &str) -> bool {
    path == PROFILE_SETUP_PATH && (method == Method::POST || method == Method::PUT)
}

/// Decide whether a request may continue past the gate.
///
/// Performs at most one directory lookup.
pub fn evaluate(
    directory: &dyn UserDirectory,
    method: &Method,
    path: &str,
    auth: Option<&AuthContext>,
) -> Result<GateDecision, DirectoryError> {
    if is_profile_setup_request(method, path) {
        return Ok(GateDecision::Forward);
    }

    // Anonymous requests are left to the access rules.
    let Some(auth) = auth else {
        return Ok(GateDecision::Forward);
    };

    let complete = match auth.subject() {
        Some(subject) => directory
            .find_by_external_id(subject)?
            .is_some_and(|user| user.is_complete()),
        None => false,
    };

    Ok(if complete {
        GateDecision::Forward
    } else {
        GateDecision::ProfileSetupRequired
    })
}

/// Middleware wrapping [`evaluate`].
pub async fn profile_completion(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = evaluate(
        state.directory.as_ref(),
        request.method(),
        request.uri().path(),
        request.extensions().get::<AuthContext>(),
    );

    match decision {
        Ok(GateDecision::Forward) => next.run(request).await,
        Ok(GateDecision::ProfileSetupRequired) => {
            tracing::debug!(
                path = %request.uri().path(),
                "Rejecting request from user with incomplete profile"
            );
            AppError::ProfileSetupRequired.into_response()
        }
        Err(e) => {
            tracing::error!("Profile completion check failed: {}", e);
            AppError::Internal(e.to_string()).into_response()
        }
    }
}
