use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Money;
use crate::domain::common::{AuditStamp, Period};
use crate::errors::{LedgerError, Result};

/// A spending limit for a category over a date period.
///
/// Active budgets for the same category must not overlap in time; the engine
/// rejects overlapping creations rather than merging them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Budget {
    pub id: Uuid,
    pub category_id: Uuid,
    pub period: Period,
    pub limit: Money,
    pub archived: bool,
    pub position: u32,
    #[serde(flatten)]
    pub audit: AuditStamp,
}

impl Budget {
    pub fn new(category_id: Uuid, period: Period, limit: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            category_id,
            period,
            limit,
            archived: false,
            position: 0,
            audit: AuditStamp::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit.is_negative() {
            return Err(LedgerError::validation(
                "budget.limit",
                "limit must not be negative",
            ));
        }
        crate::domain::account::validate_currency_code(&self.limit.currency)
    }
}

impl crate::domain::common::Identifiable for Budget {
    fn id(&self) -> Uuid {
        self.id
    }
}
