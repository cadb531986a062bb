//! HTTP API handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::budget::{BudgetEntry, BudgetPatch, CreateBudgetRequest};
use crate::error::ApiError;
use crate::metrics::track_store;
use crate::store::BudgetStore;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Budget persistence.
    pub store: Arc<dyn BudgetStore>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create app state over a store.
    pub fn new(store: Arc<dyn BudgetStore>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    /// Expose metrics through `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the store answered a ping.
    pub ready: bool,
    /// Store error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body returned after a successful update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedBudgetResponse {
    pub message: &'static str,
    pub updated_budget: BudgetEntry,
}

/// Body returned after a successful delete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedBudgetResponse {
    pub message: &'static str,
    pub deleted_budget: BudgetEntry,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if the store answers, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Prometheus exposition, 404 when no recorder is installed.
pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `GET /api/budgets`
#[instrument(skip(state))]
pub async fn list_budgets(
    State(state): State<AppState>,
) -> Result<Json<Vec<BudgetEntry>>, ApiError> {
    let budgets = track_store("list", state.store.list()).await?;
    Ok(Json(budgets))
}

/// `POST /api/budgets`
///
/// Required fields are checked here, so a rejected body never reaches the
/// store.
#[instrument(skip(state, payload))]
pub async fn create_budget(
    State(state): State<AppState>,
    payload: Result<Json<CreateBudgetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BudgetEntry>), ApiError> {
    let budget = json_body(payload)?.into_new_budget(OffsetDateTime::now_utc())?;

    let created = track_store("insert", state.store.insert(budget)).await?;
    info!(id = %created.id, title = %created.title, "budget created");

    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /api/budgets/:id`
#[instrument(skip(state, payload))]
pub async fn update_budget(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<BudgetPatch>, JsonRejection>,
) -> Result<Json<UpdatedBudgetResponse>, ApiError> {
    let patch = json_body(payload)?;
    patch.validate()?;

    let updated = track_store("update", state.store.update(&id, patch))
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(%id, "budget updated");

    Ok(Json(UpdatedBudgetResponse {
        message: "Budget updated successfully",
        updated_budget: updated,
    }))
}

/// `DELETE /api/budgets/:id`
#[instrument(skip(state))]
pub async fn delete_budget(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedBudgetResponse>, ApiError> {
    let deleted = track_store("delete", state.store.delete(&id))
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(%id, "budget deleted");

    Ok(Json(DeletedBudgetResponse {
        message: "Budget deleted successfully",
        deleted_budget: deleted,
    }))
}
