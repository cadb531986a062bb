//! HTTP API module: budget CRUD plus health, readiness and metrics.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
