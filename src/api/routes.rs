//! HTTP API route definitions.

use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_budget, delete_budget, health, list_budgets, ready, render_metrics, update_budget,
    AppState,
};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(render_metrics))
        // Budget CRUD
        .route("/api/budgets", get(list_budgets).post(create_budget))
        .route("/api/budgets/:id", put(update_budget).delete(delete_budget))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
