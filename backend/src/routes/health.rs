use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /actuator/health - Liveness plus a directory round trip
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = match state.directory.count_users() {
        Ok(_) => (StatusCode::OK, "UP"),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "DOWN")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/actuator/health", get(health))
}
