//! In-memory reference backend, used as a test double and as the template
//! for platform-specific adapters.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

use uuid::Uuid;

use crate::domain::{Account, Budget, Category, Transaction};
use crate::errors::{LedgerError, Result};

use super::{upsert, LedgerStore, Snapshot};

const DEFAULT_SCOPE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct MemoryInner {
    committed: Snapshot,
    staged: Option<Snapshot>,
    scope_owner: Option<ThreadId>,
    commit_failures: u32,
}

/// Keeps all entities in memory behind a single mutex. One write scope is
/// open at a time; `begin_scope` waits for the current scope up to a bounded
/// timeout, then surfaces `StorageUnavailable` rather than blocking forever.
/// Staged writes are visible only to the thread holding the scope; every
/// other reader keeps seeing the committed state until the commit lands.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    scope_freed: Condvar,
    scope_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_scope_timeout(DEFAULT_SCOPE_TIMEOUT)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope_timeout(scope_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            scope_freed: Condvar::new(),
            scope_timeout,
        }
    }

    /// Makes the next `count` scope commits fail with `StorageUnavailable`.
    /// Test hook for exercising retry and rollback paths.
    pub fn inject_commit_failures(&self, count: u32) {
        self.lock().commit_failures = count;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // Mutex poisoning only happens when a holder panicked; the snapshot
        // itself is still the last consistent state.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        let inner = self.lock();
        let snapshot = match &inner.staged {
            Some(staged) if inner.scope_owner == Some(thread::current().id()) => staged,
            _ => &inner.committed,
        };
        f(snapshot)
    }

    fn write(&self, f: impl FnOnce(&mut Snapshot) -> Uuid) -> Result<Uuid> {
        let mut inner = self.lock();
        if inner.scope_owner == Some(thread::current().id()) {
            if let Some(staged) = inner.staged.as_mut() {
                return Ok(f(staged));
            }
        }
        Ok(f(&mut inner.committed))
    }
}

impl LedgerStore for MemoryStore {
    fn load_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.read(|s| s.accounts.clone()))
    }

    fn load_categories(&self) -> Result<Vec<Category>> {
        Ok(self.read(|s| s.categories.clone()))
    }

    fn load_transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.read(|s| s.transactions.clone()))
    }

    fn load_budgets(&self) -> Result<Vec<Budget>> {
        Ok(self.read(|s| s.budgets.clone()))
    }

    fn save_account(&self, account: &Account) -> Result<Uuid> {
        self.write(|s| upsert(&mut s.accounts, account))
    }

    fn save_category(&self, category: &Category) -> Result<Uuid> {
        self.write(|s| upsert(&mut s.categories, category))
    }

    fn save_transaction(&self, transaction: &Transaction) -> Result<Uuid> {
        self.write(|s| upsert(&mut s.transactions, transaction))
    }

    fn save_budget(&self, budget: &Budget) -> Result<Uuid> {
        self.write(|s| upsert(&mut s.budgets, budget))
    }

    fn begin_scope(&self) -> Result<()> {
        let mut inner = self.lock();
        while inner.staged.is_some() {
            let (guard, timeout) = self
                .scope_freed
                .wait_timeout(inner, self.scope_timeout)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            inner = guard;
            if timeout.timed_out() && inner.staged.is_some() {
                return Err(LedgerError::StorageUnavailable(
                    "timed out waiting for an open storage scope".into(),
                ));
            }
        }
        inner.staged = Some(inner.committed.clone());
        inner.scope_owner = Some(thread::current().id());
        Ok(())
    }

    fn commit_scope(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.commit_failures > 0 {
            inner.commit_failures -= 1;
            // Scope stays open so the caller may retry.
            return Err(LedgerError::StorageUnavailable(
                "injected commit failure".into(),
            ));
        }
        match inner.staged.take() {
            Some(staged) => {
                inner.committed = staged;
                inner.scope_owner = None;
                drop(inner);
                self.scope_freed.notify_one();
                Ok(())
            }
            None => Err(LedgerError::StorageUnavailable(
                "commit without an open scope".into(),
            )),
        }
    }

    fn rollback_scope(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.staged = None;
        inner.scope_owner = None;
        drop(inner);
        self.scope_freed.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyCode;

    fn account(name: &str) -> Account {
        Account::new(name, CurrencyCode::new("USD"), 0)
    }

    #[test]
    fn save_is_an_upsert() {
        let store = MemoryStore::new();
        let mut acc = account("Checking");
        store.save_account(&acc).unwrap();
        acc.name = "Renamed".into();
        store.save_account(&acc).unwrap();

        let accounts = store.load_accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Renamed");
    }

    #[test]
    fn rollback_discards_staged_writes() {
        let store = MemoryStore::new();
        store.save_account(&account("Keep")).unwrap();

        store.begin_scope().unwrap();
        store.save_account(&account("Discard")).unwrap();
        assert_eq!(store.load_accounts().unwrap().len(), 2);
        store.rollback_scope().unwrap();

        let accounts = store.load_accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Keep");
    }

    #[test]
    fn commit_publishes_staged_writes() {
        let store = MemoryStore::new();
        store.begin_scope().unwrap();
        store.save_account(&account("Committed")).unwrap();
        store.commit_scope().unwrap();
        assert_eq!(store.load_accounts().unwrap().len(), 1);
    }

    #[test]
    fn begin_scope_times_out_while_another_scope_is_open() {
        let store = MemoryStore::with_scope_timeout(Duration::from_millis(10));
        store.begin_scope().unwrap();
        assert!(matches!(
            store.begin_scope(),
            Err(LedgerError::StorageUnavailable(_))
        ));
        store.rollback_scope().unwrap();
        store.begin_scope().unwrap();
    }

    #[test]
    fn other_threads_read_committed_state_while_a_scope_is_open() {
        let store = MemoryStore::new();
        store.save_account(&account("Committed")).unwrap();

        store.begin_scope().unwrap();
        store.save_account(&account("Staged")).unwrap();
        // The scope holder sees its own staged writes, nobody else does.
        assert_eq!(store.load_accounts().unwrap().len(), 2);
        std::thread::scope(|s| {
            let seen = s.spawn(|| store.load_accounts().unwrap().len());
            assert_eq!(seen.join().unwrap(), 1);
        });

        store.commit_scope().unwrap();
        std::thread::scope(|s| {
            let seen = s.spawn(|| store.load_accounts().unwrap().len());
            assert_eq!(seen.join().unwrap(), 2);
        });
    }

    #[test]
    fn failed_commit_keeps_the_scope_open_for_retry() {
        let store = MemoryStore::new();
        store.begin_scope().unwrap();
        store.save_account(&account("Retried")).unwrap();
        store.inject_commit_failures(1);
        assert!(store.commit_scope().is_err());
        store.commit_scope().unwrap();
        assert_eq!(store.load_accounts().unwrap().len(), 1);
    }
}
