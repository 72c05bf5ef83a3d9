//! Router assembly

use crate::state::AppState;
use crate::{handlers, middleware, proxy};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the gateway router
///
/// The edge gate wraps every route, including the 404 fallback, so unknown
/// gated paths are still refused before anything else runs.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/report/:id",
            get(proxy::proxy_report).post(proxy::proxy_report),
        )
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), middleware::edge_gate))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
