use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error type that captures ledger, budgeting, and storage failures.
///
/// Every rejected command names the invariant it violated; storage faults
/// carry enough context for the caller to decide whether a retry is useful.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed for `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
    #[error("category {0} would create a cycle in the parent chain")]
    CyclicCategory(Uuid),
    #[error("{kind} {id} still has dependent transactions")]
    HasDependentTransactions { kind: &'static str, id: Uuid },
    #[error("category {category} already has an active budget overlapping this period")]
    OverlappingBudget { category: Uuid },
    #[error("cannot aggregate {from} amounts into a {to} budget without conversion")]
    UnsupportedConversion { from: String, to: String },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("category not found: {0}")]
    CategoryNotFound(Uuid),
    #[error("transaction not found: {0}")]
    TransactionNotFound(Uuid),
    #[error("budget not found: {0}")]
    BudgetNotFound(Uuid),
}

impl LedgerError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Returns `true` for storage faults that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StorageUnavailable(_))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::StorageUnavailable(err.to_string())
    }
}
