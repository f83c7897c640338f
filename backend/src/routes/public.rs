//! Unauthenticated endpoints under `/public`.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::error::AppError;
use crate::models::UserRole;
use crate::AppState;

async fn hello() -> &'static str {
    "Hello World"
}

/// GET /public/roles - All configured roles
async fn roles(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserRole>>, AppError> {
    let roles = state.directory.list_roles().map_err(|e| {
        tracing::error!("Failed to list roles: {}", e);
        AppError::from(e)
    })?;
    Ok(Json(roles))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/public/hello", get(hello))
        .route("/public/roles", get(roles))
}
