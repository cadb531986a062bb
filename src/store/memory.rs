//! In-memory budget store.
//!
//! Used by the test suite and by `STORE_BACKEND=memory` for running the
//! service without a database. Ids use the same ObjectId hex format the
//! MongoDB store produces.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mongodb::bson::oid::ObjectId;

use crate::budget::{stored_date, BudgetEntry, BudgetPatch, NewBudget};
use crate::error::StoreError;

use super::BudgetStore;

/// Entry plus its insertion sequence number, used for ordering `list`.
#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    entry: BudgetEntry,
}

/// Process-local budget store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBudgetStore {
    /// Entries keyed by id.
    entries: Arc<DashMap<String, Slot>>,
    /// Next insertion sequence number.
    next_seq: Arc<AtomicU64>,
    /// When set, every operation fails.
    unavailable: Arc<AtomicBool>,
}

impl MemoryBudgetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store is switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BudgetStore for MemoryBudgetStore {
    async fn list(&self) -> Result<Vec<BudgetEntry>, StoreError> {
        self.check_available()?;

        let mut slots: Vec<Slot> = self
            .entries
            .iter()
            .map(|item| item.value().clone())
            .collect();
        slots.sort_by_key(|slot| slot.seq);
        Ok(slots.into_iter().map(|slot| slot.entry).collect())
    }

    async fn insert(&self, budget: NewBudget) -> Result<BudgetEntry, StoreError> {
        self.check_available()?;

        let entry = BudgetEntry {
            id: ObjectId::new().to_hex(),
            title: budget.title,
            amount: budget.amount,
            category: budget.category,
            date: stored_date(budget.date),
        };
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(
            entry.id.clone(),
            Slot {
                seq,
                entry: entry.clone(),
            },
        );
        Ok(entry)
    }

    async fn update(
        &self,
        id: &str,
        patch: BudgetPatch,
    ) -> Result<Option<BudgetEntry>, StoreError> {
        self.check_available()?;

        Ok(self.entries.get_mut(id).map(|mut slot| {
            patch.apply_to(&mut slot.entry);
            slot.entry.date = stored_date(slot.entry.date);
            slot.entry.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<Option<BudgetEntry>, StoreError> {
        self.check_available()?;

        Ok(self.entries.remove(id).map(|(_, slot)| slot.entry))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
