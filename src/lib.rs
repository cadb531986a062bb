//! HTTP service for budget entries stored in MongoDB.
//!
//! Four JSON endpoints manage a single record type:
//!
//! ```text
//! GET    /api/budgets       list every entry
//! POST   /api/budgets       create {title, amount, category, date?}
//! PUT    /api/budgets/:id   update any subset of fields
//! DELETE /api/budgets/:id   remove an entry
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`budget`]: Budget entry record and request validation
//! - [`store`]: Persistence trait with MongoDB and in-memory stores
//! - [`api`]: HTTP handlers and router
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod budget;
pub mod config;
pub mod error;
pub mod metrics;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, ServiceError, StoreError};
