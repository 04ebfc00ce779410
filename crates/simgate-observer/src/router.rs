//! Axum router construction for the observer API.
//!
//! The fixed status and operator routes are registered before the `{kind}`
//! routes, so a kind can never shadow them.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{handlers, operator};
use crate::state::AppState;

/// Build the complete Axum router for the observer server.
///
/// CORS allows any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(handlers::status))
        .route("/api/operations", get(handlers::list_operations))
        .route("/api/integrations", get(handlers::list_integrations))
        .route("/api/operator/pause", post(operator::pause))
        .route("/api/operator/resume", post(operator::resume))
        .route("/api/operator/speed", post(operator::set_speed))
        .route("/api/{kind}", get(handlers::list_objects))
        .route("/api/{kind}/{id}", get(handlers::get_object))
        .route("/api/{kind}/{id}/invoke", post(handlers::invoke_method))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
