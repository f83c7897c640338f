//! Current-user endpoints under `/api/users`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::auth::{AuthContext, PROFILE_SETUP_PATH};
use crate::error::AppError;
use crate::models::{User, UserProfileDto};
use crate::AppState;

/// POST /api/users/profile - Create the caller's local profile
async fn setup_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    profile: Result<Json<UserProfileDto>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let subject = auth
        .subject()
        .ok_or_else(|| AppError::BadRequest("Token has no subject claim.".to_string()))?;

    let Json(profile) = profile.map_err(|rejection| {
        tracing::info!(sub = subject, "Malformed profile request: {}", rejection);
        AppError::BadRequest(rejection.body_text())
    })?;

    match state.profiles.create_profile(subject, auth.email(), profile) {
        Ok(user) => {
            tracing::info!(sub = subject, user_id = user.id, "Profile created");
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(e) => {
            let err = AppError::from(e);
            if err.status().is_server_error() {
                tracing::error!(sub = subject, "Profile creation failed: {}", err);
            } else {
                tracing::info!(sub = subject, "Profile creation rejected: {}", err);
            }
            Err(err)
        }
    }
}

/// GET /api/users/me, /api/users/you - The caller's user record
async fn current_user(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<User>, AppError> {
    let subject = auth.subject().unwrap_or_default();

    match state.directory.find_by_external_id(subject)? {
        Some(user) => Ok(Json(user)),
        None => {
            // The profile gate should have stopped this request.
            tracing::error!(sub = subject, "Authenticated request passed the profile gate without a user record");
            Err(AppError::UserRecordMissing(subject.to_string()))
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(PROFILE_SETUP_PATH, post(setup_profile))
        .route("/api/users/me", get(current_user))
        .route("/api/users/you", get(current_user))
}
