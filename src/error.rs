//! Unified error types for the budget service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::metrics;

/// Message returned when an id does not match any stored budget.
pub const NOT_FOUND_MESSAGE: &str = "Budget not found";

/// Process-level errors raised while starting the service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Environment could not be deserialized into a config.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// The Mongo backend was selected without a connection string.
    #[error("MongoDB URI is not defined (set MONGO_URI in the environment or .env file)")]
    MissingMongoUri,

    /// Configuration values are present but inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store construction failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by a [`BudgetStore`](crate::store::BudgetStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The client could not be built from the connection string.
    #[error("failed to connect to MongoDB: {0}")]
    Connect(String),

    /// Error reported by the MongoDB driver.
    #[error("{0}")]
    Driver(#[from] mongodb::error::Error),

    /// A stored document could not be turned into a budget entry.
    #[error("malformed budget document {id}: {reason}")]
    Malformed {
        /// Id of the offending document.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Input rejected before reaching the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required fields were absent or falsy.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// A text field was supplied but empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Amount was NaN or infinite.
    #[error("amount must be a finite number")]
    NonFiniteAmount,
}

/// Errors returned from HTTP handlers, rendered as JSON bodies.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Field validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request body could not be parsed.
    #[error("{0}")]
    InvalidBody(String),

    /// No budget matched the requested id.
    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound,

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::InvalidBody(_) => "invalid_body",
            ApiError::NotFound => "not_found",
            ApiError::Store(_) => "store",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::inc_api_errors(self.kind());

        let body = match &self {
            ApiError::NotFound => json!({ "message": NOT_FOUND_MESSAGE }),
            ApiError::Store(e) => {
                error!(error = %e, "store operation failed");
                json!({ "error": e.to_string() })
            }
            ApiError::Validation(_) | ApiError::InvalidBody(_) => {
                warn!(error = %self, "rejected request");
                json!({ "error": self.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}
