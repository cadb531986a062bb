//! Persistence for budget entries.
//!
//! This module handles:
//! - The [`BudgetStore`] trait handlers are written against
//! - A MongoDB-backed store
//! - An in-memory store for tests and local runs

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::budget::{BudgetEntry, BudgetPatch, NewBudget};
use crate::error::StoreError;

pub use memory::MemoryBudgetStore;
pub use mongo::MongoBudgetStore;

/// Storage operations behind the HTTP API.
///
/// Identifiers are owned by the store: callers pass path segments through
/// unchanged, and an id the store cannot interpret simply matches nothing.
#[async_trait]
pub trait BudgetStore: Send + Sync + 'static {
    /// Every stored entry in the store's natural order.
    async fn list(&self) -> Result<Vec<BudgetEntry>, StoreError>;

    /// Persist a new entry and return it with its assigned id.
    async fn insert(&self, budget: NewBudget) -> Result<BudgetEntry, StoreError>;

    /// Apply `patch` to the entry with `id`, returning the updated entry.
    async fn update(&self, id: &str, patch: BudgetPatch) -> Result<Option<BudgetEntry>, StoreError>;

    /// Remove the entry with `id`, returning what was stored.
    async fn delete(&self, id: &str) -> Result<Option<BudgetEntry>, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
