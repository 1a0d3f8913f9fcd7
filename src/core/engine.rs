//! Ledger engine: the command surface mutating accounts, categories,
//! transactions, and budgets through the persistence gateway.
//!
//! The engine is the sole writer of `Account.balance_minor_units`. Balances
//! are maintained incrementally (apply and reverse are O(1)) while
//! [`LedgerEngine::recompute_balance`] replays transactions from the opening
//! balance and remains the source of truth used to detect and repair drift.
//!
//! Commands targeting the same account serialize on a per-account mutex;
//! commands on different accounts proceed concurrently. Operations spanning
//! two accounts take their locks in id order. Catalog writes (account,
//! category, and budget create/update/archive/reorder) serialize on a
//! per-kind gate so position assignment, overlap checks, and parent-chain
//! checks cannot race.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::tracker::{self, BudgetReport};
use crate::currency::{CurrencyCode, Money};
use crate::domain::common::Identifiable;
use crate::domain::{Account, Budget, Category, CategoryKind, Period, Transaction};
use crate::errors::{LedgerError, Result};
use crate::storage::LedgerStore;

const MAX_PARENT_DEPTH: usize = 32;
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Outcome of replaying one account's transactions from the opening balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceRepair {
    pub account_id: Uuid,
    pub stored_minor_units: i64,
    pub recomputed_minor_units: i64,
}

impl BalanceRepair {
    pub fn drifted(&self) -> bool {
        self.stored_minor_units != self.recomputed_minor_units
    }
}

pub struct LedgerEngine<S: LedgerStore> {
    store: S,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    account_gate: Mutex<()>,
    category_gate: Mutex<()>,
    budget_gate: Mutex<()>,
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            account_gate: Mutex::new(()),
            category_gate: Mutex::new(()),
            budget_gate: Mutex::new(()),
        }
    }

    /// Builds the engine and repairs any balance drift left by a crash
    /// between a transaction write and its balance update.
    pub fn open(store: S) -> Result<Self> {
        let engine = Self::new(store);
        engine.repair_balances()?;
        Ok(engine)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ----- accounts -------------------------------------------------------

    pub fn create_account(
        &self,
        name: impl Into<String>,
        currency: CurrencyCode,
        opening_minor_units: i64,
    ) -> Result<Account> {
        let _gate = gate(&self.account_gate);
        let mut account = Account::new(name, currency, opening_minor_units);
        account.position = self.store.load_accounts()?.len() as u32 + 1;
        account.validate()?;
        self.scoped(|store| {
            store.save_account(&account)?;
            Ok(account.clone())
        })
    }

    /// Applies `mutate` to the stored account and persists the result.
    ///
    /// Derived balance state is engine-owned and survives the mutator
    /// untouched; a change to the opening balance shifts the current balance
    /// by the same delta. Changing the currency is rejected while live
    /// transactions reference the account.
    pub fn update_account(&self, id: Uuid, mutate: impl FnOnce(&mut Account)) -> Result<Account> {
        let handles = self.lock_handles(&[id]);
        let _guards = lock_all(&handles);

        let original = self
            .store
            .account(id)?
            .ok_or(LedgerError::AccountNotFound(id))?;
        let mut account = original.clone();
        mutate(&mut account);
        account.id = original.id;
        account.balance_minor_units = original.balance_minor_units;
        account.audit.created_at = original.audit.created_at;
        account.validate()?;

        if account.currency != original.currency && !self.live_transactions_for(id)?.is_empty() {
            return Err(LedgerError::validation(
                "account.currency",
                "cannot change currency while transactions reference the account",
            ));
        }
        if account.opening_minor_units != original.opening_minor_units {
            account.balance_minor_units +=
                account.opening_minor_units - original.opening_minor_units;
        }
        account.audit.touch();
        self.scoped(|store| {
            store.save_account(&account)?;
            Ok(account.clone())
        })
    }

    /// Archives an account. With live transactions attached this fails with
    /// `HasDependentTransactions` unless `cascade` is set, in which case the
    /// dependents are soft-deleted and every touched balance is recomputed.
    pub fn archive_account(&self, id: Uuid, cascade: bool) -> Result<Account> {
        loop {
            let guess = self.live_transactions_for(id)?;
            let mut touched: Vec<Uuid> = vec![id];
            for txn in &guess {
                touched.extend(accounts_of(txn));
            }
            let handles = self.lock_handles(&touched);
            let _guards = lock_all(&handles);

            // The dependents were read before the locks; start over when
            // the set no longer matches what was locked.
            let dependents = self.live_transactions_for(id)?;
            let mut current: Vec<Uuid> = vec![id];
            for txn in &dependents {
                current.extend(accounts_of(txn));
            }
            if dedup(&current) != dedup(&touched) {
                continue;
            }
            if !dependents.is_empty() && !cascade {
                return Err(LedgerError::HasDependentTransactions {
                    kind: "account",
                    id,
                });
            }

            return self.scoped(|store| {
                for txn in &dependents {
                    let mut deleted = txn.clone();
                    deleted.deleted = true;
                    deleted.audit.touch();
                    store.save_transaction(&deleted)?;
                }
                let transactions = store.load_transactions()?;
                for account_id in dedup(&current) {
                    let mut account = store
                        .account(account_id)?
                        .ok_or(LedgerError::AccountNotFound(account_id))?;
                    account.balance_minor_units = replayed_balance(&account, &transactions);
                    if account_id == id {
                        account.archived = true;
                    }
                    account.audit.touch();
                    store.save_account(&account)?;
                }
                store
                    .account(id)?
                    .ok_or(LedgerError::AccountNotFound(id))
            });
        }
    }

    pub fn account_balance(&self, id: Uuid) -> Result<Money> {
        let account = self
            .store
            .account(id)?
            .ok_or(LedgerError::AccountNotFound(id))?;
        Ok(account.balance())
    }

    pub fn list_accounts(&self, include_archived: bool) -> Result<Vec<Account>> {
        let mut accounts = self.store.load_accounts()?;
        if !include_archived {
            accounts.retain(|a| !a.archived);
        }
        accounts.sort_by_key(|a| a.position);
        Ok(accounts)
    }

    /// Moves an account to `new_position` (1-based), shifting the others.
    pub fn reorder_account(&self, id: Uuid, new_position: u32) -> Result<Account> {
        let _gate = gate(&self.account_gate);
        let accounts = self.store.load_accounts()?;
        if !accounts.iter().any(|a| a.id == id) {
            return Err(LedgerError::AccountNotFound(id));
        }
        let changed = reorder(accounts, id, new_position)?;
        self.scoped(|store| {
            for account in &changed {
                store.save_account(account)?;
            }
            store.account(id)?.ok_or(LedgerError::AccountNotFound(id))
        })
    }

    // ----- categories -----------------------------------------------------

    pub fn create_category(
        &self,
        name: impl Into<String>,
        kind: CategoryKind,
        parent_id: Option<Uuid>,
    ) -> Result<Category> {
        let _gate = gate(&self.category_gate);
        let mut category = Category::new(name, kind);
        category.parent_id = parent_id;
        category.position = self.store.load_categories()?.len() as u32 + 1;
        category.validate()?;
        let categories = self.store.load_categories()?;
        assert_parent_chain(&categories, &category)?;
        self.scoped(|store| {
            store.save_category(&category)?;
            Ok(category.clone())
        })
    }

    pub fn update_category(&self, id: Uuid, mutate: impl FnOnce(&mut Category)) -> Result<Category> {
        let _gate = gate(&self.category_gate);
        let original = self
            .store
            .category(id)?
            .ok_or(LedgerError::CategoryNotFound(id))?;
        let mut category = original.clone();
        mutate(&mut category);
        category.id = original.id;
        category.audit.created_at = original.audit.created_at;
        category.validate()?;
        let categories = self.store.load_categories()?;
        assert_parent_chain(&categories, &category)?;
        category.audit.touch();
        self.scoped(|store| {
            store.save_category(&category)?;
            Ok(category.clone())
        })
    }

    /// Archives a category. Live transactions or active child categories
    /// block the archive unless `cascade` is set: the child subtree is
    /// archived alongside and live transactions are detached to the
    /// category's parent (balances are untouched).
    pub fn archive_category(&self, id: Uuid, cascade: bool) -> Result<Category> {
        let _gate = gate(&self.category_gate);
        let target = self
            .store
            .category(id)?
            .ok_or(LedgerError::CategoryNotFound(id))?;
        let categories = self.store.load_categories()?;
        let subtree = descendants(&categories, id);
        let live_children: Vec<&Category> = subtree.iter().filter(|c| !c.archived).collect();
        let mut dependents: Vec<Transaction> = self
            .store
            .load_transactions()?
            .into_iter()
            .filter(|t| !t.deleted && t.category_id == Some(id))
            .collect();

        if (!dependents.is_empty() || !live_children.is_empty()) && !cascade {
            return Err(LedgerError::HasDependentTransactions {
                kind: "category",
                id,
            });
        }

        self.scoped(|store| {
            for child in &subtree {
                if !child.archived {
                    let mut archived = (*child).clone();
                    archived.archived = true;
                    archived.audit.touch();
                    store.save_category(&archived)?;
                }
            }
            for txn in dependents.iter_mut() {
                txn.category_id = target.parent_id;
                txn.audit.touch();
                store.save_transaction(txn)?;
            }
            let mut archived = target.clone();
            archived.archived = true;
            archived.audit.touch();
            store.save_category(&archived)?;
            Ok(archived)
        })
    }

    pub fn list_categories(&self, include_archived: bool) -> Result<Vec<Category>> {
        let mut categories = self.store.load_categories()?;
        if !include_archived {
            categories.retain(|c| !c.archived);
        }
        categories.sort_by_key(|c| c.position);
        Ok(categories)
    }

    pub fn reorder_category(&self, id: Uuid, new_position: u32) -> Result<Category> {
        let _gate = gate(&self.category_gate);
        let categories = self.store.load_categories()?;
        if !categories.iter().any(|c| c.id == id) {
            return Err(LedgerError::CategoryNotFound(id));
        }
        let changed = reorder(categories, id, new_position)?;
        self.scoped(|store| {
            for category in &changed {
                store.save_category(category)?;
            }
            store
                .category(id)?
                .ok_or(LedgerError::CategoryNotFound(id))
        })
    }

    // ----- transactions ---------------------------------------------------

    /// Records a signed movement against one account and applies its delta
    /// to the account balance atomically.
    pub fn record_transaction(
        &self,
        account_id: Uuid,
        category_id: Option<Uuid>,
        amount: Money,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<Transaction> {
        let mut txn = Transaction::new(account_id, category_id, amount, date);
        txn.note = note;
        self.commit_new_transaction(txn)
    }

    /// Records a transfer between two accounts as a single transaction with
    /// a destination leg. `amount` is the positive magnitude leaving the
    /// source; `to_amount` must be given when the currencies differ.
    pub fn record_transfer(
        &self,
        from_account: Uuid,
        to_account: Uuid,
        amount: Money,
        to_amount: Option<Money>,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<Transaction> {
        if amount.is_negative() || amount.is_zero() {
            return Err(LedgerError::InvalidAmount(
                "transfer amount must be positive".into(),
            ));
        }
        let source = self
            .store
            .account(from_account)?
            .ok_or(LedgerError::AccountNotFound(from_account))?;
        let destination = self
            .store
            .account(to_account)?
            .ok_or(LedgerError::AccountNotFound(to_account))?;
        let credited = match to_amount {
            Some(value) => value,
            None => {
                if source.currency != destination.currency {
                    return Err(LedgerError::CurrencyMismatch {
                        left: source.currency.to_string(),
                        right: destination.currency.to_string(),
                    });
                }
                amount.clone()
            }
        };
        let mut txn = Transaction::new(from_account, None, amount.negated(), date)
            .with_transfer(to_account, credited);
        txn.note = note;
        self.commit_new_transaction(txn)
    }

    fn commit_new_transaction(&self, txn: Transaction) -> Result<Transaction> {
        txn.validate()?;
        self.assert_transaction_references(&txn)?;

        let involved = accounts_of(&txn);
        let handles = self.lock_handles(&involved);
        let _guards = lock_all(&handles);

        self.scoped(|store| {
            store.save_transaction(&txn)?;
            apply_deltas(store, &deltas(&txn), 1)?;
            Ok(txn.clone())
        })
    }

    /// Edits a transaction as reverse-then-apply against the (possibly two
    /// different) account sets, never as an in-place balance diff.
    pub fn edit_transaction(
        &self,
        id: Uuid,
        mutate: impl Fn(&mut Transaction),
    ) -> Result<Transaction> {
        loop {
            let guess = self
                .store
                .transaction(id)?
                .ok_or(LedgerError::TransactionNotFound(id))?;
            let mut scratch = guess.clone();
            mutate(&mut scratch);
            let mut involved = accounts_of(&guess);
            involved.extend(accounts_of(&scratch));
            let handles = self.lock_handles(&involved);
            let _guards = lock_all(&handles);

            // The read above ran before the locks; a concurrent command
            // may have changed the transaction, so redo the edit from the
            // locked state and start over if the account set grew.
            let original = self
                .store
                .transaction(id)?
                .ok_or(LedgerError::TransactionNotFound(id))?;
            if original.deleted {
                return Err(LedgerError::validation(
                    "transaction",
                    "deleted transactions cannot be edited",
                ));
            }
            let mut updated = original.clone();
            mutate(&mut updated);
            updated.id = original.id;
            updated.deleted = false;
            updated.audit.created_at = original.audit.created_at;

            let locked = dedup(&involved);
            let mut current = accounts_of(&original);
            current.extend(accounts_of(&updated));
            if !dedup(&current).iter().all(|account| locked.contains(account)) {
                continue;
            }

            updated.validate()?;
            self.assert_transaction_references(&updated)?;
            return self.scoped(|store| {
                apply_deltas(store, &deltas(&original), -1)?;
                apply_deltas(store, &deltas(&updated), 1)?;
                let mut stored = updated.clone();
                stored.audit.touch();
                store.save_transaction(&stored)?;
                Ok(stored)
            });
        }
    }

    /// Soft-deletes a transaction and reverses its balance contribution.
    /// Deleting an already-deleted transaction is a no-op.
    pub fn delete_transaction(&self, id: Uuid) -> Result<()> {
        loop {
            let guess = self
                .store
                .transaction(id)?
                .ok_or(LedgerError::TransactionNotFound(id))?;
            if guess.deleted {
                return Ok(());
            }
            let involved = accounts_of(&guess);
            let handles = self.lock_handles(&involved);
            let _guards = lock_all(&handles);

            // Re-read under the locks; a concurrent command may have
            // deleted or moved the transaction after the first read, and
            // the reversal must apply exactly once.
            let txn = self
                .store
                .transaction(id)?
                .ok_or(LedgerError::TransactionNotFound(id))?;
            if txn.deleted {
                return Ok(());
            }
            if dedup(&accounts_of(&txn)) != dedup(&involved) {
                continue;
            }

            return self.scoped(|store| {
                apply_deltas(store, &deltas(&txn), -1)?;
                let mut deleted = txn.clone();
                deleted.deleted = true;
                deleted.audit.touch();
                store.save_transaction(&deleted)?;
                Ok(())
            });
        }
    }

    /// Audit query: deleted transactions stay retrievable with
    /// `include_deleted`.
    pub fn list_transactions(&self, include_deleted: bool) -> Result<Vec<Transaction>> {
        let mut transactions = self.store.load_transactions()?;
        if !include_deleted {
            transactions.retain(|t| !t.deleted);
        }
        transactions.sort_by_key(|t| t.date);
        Ok(transactions)
    }

    // ----- budgets --------------------------------------------------------

    pub fn create_budget(&self, category_id: Uuid, period: Period, limit: Money) -> Result<Budget> {
        let _gate = gate(&self.budget_gate);
        let mut budget = Budget::new(category_id, period, limit);
        budget.position = self.store.load_budgets()?.len() as u32 + 1;
        budget.validate()?;
        self.store
            .category(category_id)?
            .ok_or(LedgerError::CategoryNotFound(category_id))?;
        self.assert_no_budget_overlap(&budget)?;
        self.scoped(|store| {
            store.save_budget(&budget)?;
            Ok(budget.clone())
        })
    }

    pub fn update_budget(&self, id: Uuid, mutate: impl FnOnce(&mut Budget)) -> Result<Budget> {
        let _gate = gate(&self.budget_gate);
        let original = self
            .store
            .budget(id)?
            .ok_or(LedgerError::BudgetNotFound(id))?;
        let mut budget = original.clone();
        mutate(&mut budget);
        budget.id = original.id;
        budget.audit.created_at = original.audit.created_at;
        budget.validate()?;
        self.store
            .category(budget.category_id)?
            .ok_or(LedgerError::CategoryNotFound(budget.category_id))?;
        self.assert_no_budget_overlap(&budget)?;
        budget.audit.touch();
        self.scoped(|store| {
            store.save_budget(&budget)?;
            Ok(budget.clone())
        })
    }

    pub fn archive_budget(&self, id: Uuid) -> Result<Budget> {
        let _gate = gate(&self.budget_gate);
        let mut budget = self
            .store
            .budget(id)?
            .ok_or(LedgerError::BudgetNotFound(id))?;
        budget.archived = true;
        budget.audit.touch();
        self.scoped(|store| {
            store.save_budget(&budget)?;
            Ok(budget.clone())
        })
    }

    pub fn list_budgets(&self, include_archived: bool) -> Result<Vec<Budget>> {
        let mut budgets = self.store.load_budgets()?;
        if !include_archived {
            budgets.retain(|b| !b.archived);
        }
        budgets.sort_by_key(|b| b.position);
        Ok(budgets)
    }

    pub fn budget_status(&self, id: Uuid) -> Result<BudgetReport> {
        let budget = self
            .store
            .budget(id)?
            .ok_or(LedgerError::BudgetNotFound(id))?;
        let transactions = self.store.load_transactions()?;
        tracker::status(&budget, &transactions)
    }

    pub fn spent_in_period(
        &self,
        category_id: Uuid,
        period: &Period,
        currency: &CurrencyCode,
    ) -> Result<Money> {
        let transactions = self.store.load_transactions()?;
        tracker::spent_in_period(&transactions, category_id, period, currency)
    }

    // ----- maintenance ----------------------------------------------------

    /// Replays all non-deleted transactions from the opening balance. Drift
    /// between the replay and the stored balance is logged and corrected.
    pub fn recompute_balance(&self, account_id: Uuid) -> Result<BalanceRepair> {
        let handles = self.lock_handles(&[account_id]);
        let _guards = lock_all(&handles);

        let mut account = self
            .store
            .account(account_id)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let transactions = self.store.load_transactions()?;
        let recomputed = replayed_balance(&account, &transactions);
        let repair = BalanceRepair {
            account_id,
            stored_minor_units: account.balance_minor_units,
            recomputed_minor_units: recomputed,
        };
        if repair.drifted() {
            tracing::warn!(
                account = %account_id,
                stored = repair.stored_minor_units,
                recomputed = repair.recomputed_minor_units,
                "balance drift detected, correcting stored balance"
            );
            account.balance_minor_units = recomputed;
            account.audit.touch();
            self.scoped(|store| {
                store.save_account(&account)?;
                Ok(())
            })?;
        }
        Ok(repair)
    }

    /// Recomputes every account, intended for startup after an unclean stop.
    pub fn repair_balances(&self) -> Result<Vec<BalanceRepair>> {
        let accounts = self.store.load_accounts()?;
        let mut repairs = Vec::with_capacity(accounts.len());
        for account in accounts {
            repairs.push(self.recompute_balance(account.id)?);
        }
        Ok(repairs)
    }

    // ----- internals ------------------------------------------------------

    /// Runs `f` inside a storage scope, committing on success (with a
    /// bounded retry on transient storage faults) and rolling back on error.
    fn scoped<T>(&self, f: impl FnOnce(&S) -> Result<T>) -> Result<T> {
        self.store.begin_scope()?;
        let value = match f(&self.store) {
            Ok(value) => value,
            Err(err) => {
                let _ = self.store.rollback_scope();
                return Err(err);
            }
        };
        let mut attempt = 1;
        loop {
            match self.store.commit_scope() {
                Ok(()) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::warn!(%err, attempt, "storage commit failed, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    let _ = self.store.rollback_scope();
                    return Err(err);
                }
            }
        }
    }

    fn assert_transaction_references(&self, txn: &Transaction) -> Result<()> {
        let account = self
            .store
            .account(txn.account_id)?
            .ok_or(LedgerError::AccountNotFound(txn.account_id))?;
        if account.archived {
            return Err(LedgerError::validation(
                "transaction.account",
                "account is archived",
            ));
        }
        txn.amount.require_same_currency(&Money::zero(account.currency.clone()))?;
        if let Some(leg) = &txn.transfer {
            let destination = self
                .store
                .account(leg.to_account_id)?
                .ok_or(LedgerError::AccountNotFound(leg.to_account_id))?;
            if destination.archived {
                return Err(LedgerError::validation(
                    "transaction.transfer",
                    "destination account is archived",
                ));
            }
            leg.to_amount
                .require_same_currency(&Money::zero(destination.currency.clone()))?;
        }
        if let Some(category_id) = txn.category_id {
            let category = self
                .store
                .category(category_id)?
                .ok_or(LedgerError::CategoryNotFound(category_id))?;
            if category.archived {
                return Err(LedgerError::validation(
                    "transaction.category",
                    "category is archived",
                ));
            }
        }
        Ok(())
    }

    fn assert_no_budget_overlap(&self, candidate: &Budget) -> Result<()> {
        for other in self.store.load_budgets()? {
            if other.id != candidate.id
                && !other.archived
                && other.category_id == candidate.category_id
                && other.period.overlaps(&candidate.period)
            {
                return Err(LedgerError::OverlappingBudget {
                    category: candidate.category_id,
                });
            }
        }
        Ok(())
    }

    fn live_transactions_for(&self, account_id: Uuid) -> Result<Vec<Transaction>> {
        Ok(self
            .store
            .load_transactions()?
            .into_iter()
            .filter(|t| !t.deleted && accounts_of(t).contains(&account_id))
            .collect())
    }

    /// Returns lock handles for the given accounts in a stable global order
    /// so multi-account operations cannot deadlock.
    fn lock_handles(&self, ids: &[Uuid]) -> Vec<Arc<Mutex<()>>> {
        let ordered = dedup(ids);
        let mut registry = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ordered
            .iter()
            .map(|id| registry.entry(*id).or_default().clone())
            .collect()
    }
}

fn gate(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_all(handles: &[Arc<Mutex<()>>]) -> Vec<MutexGuard<'_, ()>> {
    handles
        .iter()
        .map(|handle| handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
        .collect()
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut ordered = ids.to_vec();
    ordered.sort();
    ordered.dedup();
    ordered
}

fn accounts_of(txn: &Transaction) -> Vec<Uuid> {
    let mut ids = vec![txn.account_id];
    if let Some(leg) = &txn.transfer {
        ids.push(leg.to_account_id);
    }
    ids
}

/// Signed minor-unit contribution of a transaction per account.
fn deltas(txn: &Transaction) -> Vec<(Uuid, i64)> {
    let mut out = vec![(txn.account_id, txn.amount.minor_units)];
    if let Some(leg) = &txn.transfer {
        out.push((leg.to_account_id, leg.to_amount.minor_units));
    }
    out
}

fn apply_deltas<S: LedgerStore>(store: &S, deltas: &[(Uuid, i64)], sign: i64) -> Result<()> {
    for (account_id, delta) in deltas {
        let mut account = store
            .account(*account_id)?
            .ok_or(LedgerError::AccountNotFound(*account_id))?;
        let signed = delta
            .checked_mul(sign)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".into()))?;
        account.balance_minor_units = account
            .balance_minor_units
            .checked_add(signed)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".into()))?;
        account.audit.touch();
        store.save_account(&account)?;
    }
    Ok(())
}

/// Source of truth for an account balance: opening balance plus the signed
/// contribution of every non-deleted transaction touching the account.
fn replayed_balance(account: &Account, transactions: &[Transaction]) -> i64 {
    let mut total = account.opening_minor_units;
    for txn in transactions.iter().filter(|t| !t.deleted) {
        if txn.account_id == account.id {
            total += txn.amount.minor_units;
        }
        if let Some(leg) = &txn.transfer {
            if leg.to_account_id == account.id {
                total += leg.to_amount.minor_units;
            }
        }
    }
    total
}

/// Walks the parent chain of `candidate`, rejecting repeats and chains
/// deeper than `MAX_PARENT_DEPTH`. Parents must exist and share the kind.
fn assert_parent_chain(categories: &[Category], candidate: &Category) -> Result<()> {
    let mut seen = vec![candidate.id];
    let mut current = candidate.parent_id;
    let mut depth = 0;
    while let Some(parent_id) = current {
        if seen.contains(&parent_id) {
            return Err(LedgerError::CyclicCategory(candidate.id));
        }
        depth += 1;
        if depth > MAX_PARENT_DEPTH {
            return Err(LedgerError::CyclicCategory(candidate.id));
        }
        let parent = categories
            .iter()
            .find(|c| c.id == parent_id)
            .ok_or(LedgerError::CategoryNotFound(parent_id))?;
        if parent.kind != candidate.kind {
            return Err(LedgerError::validation(
                "category.parent",
                "parent category must have the same kind",
            ));
        }
        seen.push(parent_id);
        current = parent.parent_id;
    }
    Ok(())
}

/// All transitive children of `root` (bounded by the tree size).
fn descendants(categories: &[Category], root: Uuid) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::new();
    let mut frontier = vec![root];
    while let Some(current) = frontier.pop() {
        for category in categories {
            if category.parent_id == Some(current) && !out.iter().any(|c| c.id == category.id) {
                frontier.push(category.id);
                out.push(category.clone());
            }
        }
    }
    out
}

/// Moves the entity `id` to `new_position` (1-based) and shifts everything
/// between the old and new slots, returning only the entities that changed.
fn reorder<T: Identifiable + Clone + Positioned>(
    mut items: Vec<T>,
    id: Uuid,
    new_position: u32,
) -> Result<Vec<T>> {
    let count = items.len() as u32;
    let old_position = items
        .iter()
        .find(|item| item.id() == id)
        .map(|item| item.position())
        .ok_or_else(|| LedgerError::validation("position", "unknown entity"))?;
    if new_position < 1 || new_position > count {
        return Err(LedgerError::validation(
            "position",
            format!("position must be between 1 and {count}"),
        ));
    }
    if new_position == old_position {
        return Ok(Vec::new());
    }
    let mut changed = Vec::new();
    for item in items.iter_mut() {
        let position = item.position();
        let updated = if item.id() == id {
            new_position
        } else if old_position < new_position && position > old_position && position <= new_position
        {
            position - 1
        } else if old_position > new_position && position >= new_position && position < old_position
        {
            position + 1
        } else {
            continue;
        };
        item.set_position(updated);
        changed.push(item.clone());
    }
    Ok(changed)
}

pub(crate) trait Positioned {
    fn position(&self) -> u32;
    fn set_position(&mut self, position: u32);
}

macro_rules! impl_positioned {
    ($($entity:ty),*) => {
        $(impl Positioned for $entity {
            fn position(&self) -> u32 {
                self.position
            }
            fn set_position(&mut self, position: u32) {
                self.position = position;
                self.audit.touch();
            }
        })*
    };
}

impl_positioned!(Account, Category, Budget);
