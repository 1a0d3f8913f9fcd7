use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::{CurrencyCode, Money};
use crate::domain::common::{validate_name, AuditStamp};
use crate::errors::Result;

/// A financial account holding a running balance in a single currency.
///
/// `balance_minor_units` is derived state owned exclusively by the ledger
/// engine: it always equals the opening balance plus the signed sum of all
/// non-deleted transactions referencing the account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub currency: CurrencyCode,
    pub opening_minor_units: i64,
    pub balance_minor_units: i64,
    pub archived: bool,
    pub position: u32,
    #[serde(flatten)]
    pub audit: AuditStamp,
}

impl Account {
    pub fn new(name: impl Into<String>, currency: CurrencyCode, opening_minor_units: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            currency,
            opening_minor_units,
            balance_minor_units: opening_minor_units,
            archived: false,
            position: 0,
            audit: AuditStamp::now(),
        }
    }

    pub fn balance(&self) -> Money {
        Money::new(self.balance_minor_units, self.currency.clone())
    }

    pub fn opening_balance(&self) -> Money {
        Money::new(self.opening_minor_units, self.currency.clone())
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("account.name", &self.name)?;
        validate_currency_code(&self.currency)?;
        Ok(())
    }
}

impl crate::domain::common::Identifiable for Account {
    fn id(&self) -> Uuid {
        self.id
    }
}

pub(crate) fn validate_currency_code(code: &CurrencyCode) -> Result<()> {
    let raw = code.as_str();
    if raw.len() != 3 || !raw.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(crate::errors::LedgerError::validation(
            "currency",
            format!("`{raw}` is not a three-letter ISO 4217 code"),
        ));
    }
    Ok(())
}
