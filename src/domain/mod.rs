//! Domain entities, validation rules, and shared budgeting primitives.

pub mod account;
pub mod budget;
pub mod category;
pub mod common;
pub mod transaction;

pub use account::Account;
pub use budget::Budget;
pub use category::{Category, CategoryKind};
pub use common::{AuditStamp, Identifiable, Period};
pub use transaction::{Transaction, TransferLeg};
