//! Persistence gateway consumed by the ledger engine and budget tracker.
//!
//! The engine never assumes a specific storage technology; it only requires
//! atomic scoped writes and reads that are consistent within a scope.

pub mod json_backend;
pub mod memory;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;
use crate::domain::{Account, Budget, Category, Transaction};
use crate::errors::Result;

pub use json_backend::JsonStore;
pub use memory::MemoryStore;

/// Abstraction over persistence backends for ledger entities.
///
/// `save_*` performs an upsert and returns the committed id. Between
/// `begin_scope` and `commit_scope` all writes are staged and visible only
/// to reads from the thread that opened the scope; other readers keep seeing
/// the committed state. `rollback_scope` discards the staged writes. A crash
/// or rollback mid-scope leaves the fully-old state.
pub trait LedgerStore: Send + Sync {
    fn load_accounts(&self) -> Result<Vec<Account>>;
    fn load_categories(&self) -> Result<Vec<Category>>;
    fn load_transactions(&self) -> Result<Vec<Transaction>>;
    fn load_budgets(&self) -> Result<Vec<Budget>>;

    fn save_account(&self, account: &Account) -> Result<Uuid>;
    fn save_category(&self, category: &Category) -> Result<Uuid>;
    fn save_transaction(&self, transaction: &Transaction) -> Result<Uuid>;
    fn save_budget(&self, budget: &Budget) -> Result<Uuid>;

    fn begin_scope(&self) -> Result<()>;
    fn commit_scope(&self) -> Result<()>;
    fn rollback_scope(&self) -> Result<()>;

    fn account(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.load_accounts()?.into_iter().find(|a| a.id == id))
    }

    fn category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.load_categories()?.into_iter().find(|c| c.id == id))
    }

    fn transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        Ok(self.load_transactions()?.into_iter().find(|t| t.id == id))
    }

    fn budget(&self, id: Uuid) -> Result<Option<Budget>> {
        Ok(self.load_budgets()?.into_iter().find(|b| b.id == id))
    }
}

/// Full entity state held by the snapshot-oriented backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub budgets: Vec<Budget>,
}

pub(crate) fn upsert<T: Identifiable + Clone>(items: &mut Vec<T>, item: &T) -> Uuid {
    let id = item.id();
    match items.iter_mut().find(|existing| existing.id() == id) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
    id
}
