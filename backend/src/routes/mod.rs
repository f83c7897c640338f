pub mod health;
pub mod public;
pub mod users;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::gate::profile_completion;
use crate::auth::middleware::{authenticate, enforce_access};
use crate::config::CorsConfig;
use crate::error::AppError;
use crate::logging::request_logger;
use crate::AppState;

async fn not_found() -> AppError {
    AppError::NotFound
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match config.origin_list() {
        None => cors.allow_origin(Any),
        Some(origins) => cors.allow_origin(AllowOrigin::list(
            origins.iter().filter_map(|o| o.parse::<HeaderValue>().ok()),
        )),
    }
}

/// Build the application router.
///
/// The security chain wraps every route and the fallback exactly once.
/// Layers run outermost-last-added, so a request passes `authenticate`,
/// then `profile_completion`, then `enforce_access`.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .merge(users::router())
        .merge(public::router())
        .merge(health::router())
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), enforce_access))
        .layer(from_fn_with_state(state.clone(), profile_completion))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
