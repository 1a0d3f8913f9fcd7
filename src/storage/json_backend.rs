//! Snapshot-file backend storing the whole ledger as one JSON document.
//!
//! Commits rewrite the file through a temp-file rename so a crash mid-write
//! leaves the previous snapshot intact.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use uuid::Uuid;

use crate::domain::{Account, Budget, Category, Transaction};
use crate::errors::{LedgerError, Result};

use super::{upsert, LedgerStore, Snapshot};

const TMP_SUFFIX: &str = "tmp";
const SCOPE_TIMEOUT: Duration = Duration::from_secs(5);

struct JsonInner {
    committed: Snapshot,
    staged: Option<Snapshot>,
    scope_owner: Option<ThreadId>,
}

/// File-backed store with the same scope semantics as [`super::MemoryStore`].
/// Writes outside a scope persist immediately; scoped writes persist once, at
/// commit.
pub struct JsonStore {
    path: PathBuf,
    inner: Mutex<JsonInner>,
    scope_freed: Condvar,
}

impl JsonStore {
    /// Opens the snapshot at `path`, creating an empty ledger if the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let committed = if path.exists() {
            let data = fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            Snapshot::default()
        };
        Ok(Self {
            path,
            inner: Mutex::new(JsonInner {
                committed,
                staged: None,
                scope_owner: None,
            }),
            scope_freed: Condvar::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JsonInner> {
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
        let id = f(&mut inner.committed);
        persist(&self.path, &inner.committed)?;
        Ok(id)
    }
}

fn persist(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let data = serde_json::to_string_pretty(snapshot)?;
    let tmp = tmp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.{TMP_SUFFIX}"),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

impl LedgerStore for JsonStore {
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
                .wait_timeout(inner, SCOPE_TIMEOUT)
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
        // The scope stays open on a failed persist so the caller may retry.
        let staged = inner.staged.clone().ok_or_else(|| {
            LedgerError::StorageUnavailable("commit without an open scope".into())
        })?;
        persist(&self.path, &staged)?;
        inner.committed = staged;
        inner.staged = None;
        inner.scope_owner = None;
        drop(inner);
        self.scope_freed.notify_one();
        Ok(())
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
