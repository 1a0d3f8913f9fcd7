//! Business logic: the ledger engine and the budget tracker.

pub mod engine;
pub mod tracker;

pub use engine::{BalanceRepair, LedgerEngine};
pub use tracker::{spent_in_period, BudgetReport, BudgetStanding};
