#![doc(test(attr(deny(warnings))))]

//! Budgetbook offers the ledger and budgeting engine behind a personal
//! budget application: accounts, categories, transactions, budgets, and
//! balance bookkeeping that behaves identically over any storage adapter.

pub mod core;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod storage;

pub use crate::core::{BalanceRepair, BudgetReport, BudgetStanding, LedgerEngine};
pub use crate::currency::{format_money, CurrencyCode, FormatOptions, LocaleConfig, Money};
pub use crate::domain::{Account, Budget, Category, CategoryKind, Period, Transaction};
pub use crate::errors::{LedgerError, Result};
pub use crate::storage::{JsonStore, LedgerStore, MemoryStore};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter =
            EnvFilter::from_default_env().add_directive("budgetbook=info".parse().unwrap());
        fmt().with_env_filter(filter).init();
        tracing::info!("budgetbook tracing initialized");
    });
}
