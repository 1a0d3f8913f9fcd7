use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Money;
use crate::domain::common::AuditStamp;
use crate::errors::{LedgerError, Result};

const MAX_NOTE_LEN: usize = 1000;

/// A single signed movement of money on an account.
///
/// Deleted transactions are retained for audit; they are excluded from
/// balance and budget computation but never removed from storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Present when this transaction moves money into another account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferLeg>,
    pub deleted: bool,
    #[serde(flatten)]
    pub audit: AuditStamp,
}

/// Destination side of a transfer, in the destination account's currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferLeg {
    pub to_account_id: Uuid,
    pub to_amount: Money,
}

impl Transaction {
    pub fn new(account_id: Uuid, category_id: Option<Uuid>, amount: Money, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            category_id,
            amount,
            date,
            note: None,
            transfer: None,
            deleted: false,
            audit: AuditStamp::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_transfer(mut self, to_account_id: Uuid, to_amount: Money) -> Self {
        self.transfer = Some(TransferLeg {
            to_account_id,
            to_amount,
        });
        self
    }

    pub fn is_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(note) = &self.note {
            if note.len() > MAX_NOTE_LEN {
                return Err(LedgerError::validation(
                    "transaction.note",
                    format!("note must not exceed {MAX_NOTE_LEN} characters"),
                ));
            }
        }
        if let Some(leg) = &self.transfer {
            if leg.to_account_id == self.account_id {
                return Err(LedgerError::validation(
                    "transaction.transfer",
                    "transfer source and destination must differ",
                ));
            }
            // Source leg must debit, destination leg must credit.
            if self.amount.minor_units > 0 || leg.to_amount.minor_units < 0 {
                return Err(LedgerError::validation(
                    "transaction.transfer",
                    "transfer amount must debit the source and credit the destination",
                ));
            }
        }
        Ok(())
    }
}

impl crate::domain::common::Identifiable for Transaction {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyCode;

    fn usd(minor_units: i64) -> Money {
        Money::new(minor_units, CurrencyCode::new("USD"))
    }

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[test]
    fn transfer_to_self_is_rejected() {
        let account = Uuid::new_v4();
        let txn =
            Transaction::new(account, None, usd(-100), sample_date()).with_transfer(account, usd(100));
        assert!(txn.validate().is_err());
    }

    #[test]
    fn transfer_legs_must_have_opposite_signs() {
        let txn = Transaction::new(Uuid::new_v4(), None, usd(100), sample_date())
            .with_transfer(Uuid::new_v4(), usd(100));
        assert!(txn.validate().is_err());

        let ok = Transaction::new(Uuid::new_v4(), None, usd(-100), sample_date())
            .with_transfer(Uuid::new_v4(), usd(100));
        assert!(ok.validate().is_ok());
    }
}
