//! Aggregates transactions against budget limits.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::{CurrencyCode, Money};
use crate::domain::{Budget, Period, Transaction};
use crate::errors::{LedgerError, Result};

/// Spending position of a budget over its period.
///
/// `remaining` is `limit - spent` and may be negative on overspend; it is
/// never clamped. Presentation decisions belong to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BudgetReport {
    pub budget_id: Uuid,
    pub category_id: Uuid,
    pub period: Period,
    pub limit: Money,
    pub spent: Money,
    pub remaining: Money,
    pub standing: BudgetStanding,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BudgetStanding {
    UnderBudget,
    OnTrack,
    OverBudget,
}

impl fmt::Display for BudgetStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetStanding::UnderBudget => "Under Budget",
            BudgetStanding::OnTrack => "On Track",
            BudgetStanding::OverBudget => "Over Budget",
        };
        f.write_str(label)
    }
}

/// Sums non-deleted transaction amounts for `category_id` within `period`.
///
/// Amounts must already be in `currency`; cross-currency aggregation is not
/// supported and fails with `UnsupportedConversion`.
pub fn spent_in_period(
    transactions: &[Transaction],
    category_id: Uuid,
    period: &Period,
    currency: &CurrencyCode,
) -> Result<Money> {
    let mut total = Money::zero(currency.clone());
    for txn in transactions {
        if txn.deleted || txn.category_id != Some(category_id) || !period.contains(txn.date) {
            continue;
        }
        if txn.amount.currency != *currency {
            return Err(LedgerError::UnsupportedConversion {
                from: txn.amount.currency.to_string(),
                to: currency.to_string(),
            });
        }
        total = total.checked_add(&txn.amount)?;
    }
    Ok(total)
}

/// Computes the full spending report for one budget.
pub fn status(budget: &Budget, transactions: &[Transaction]) -> Result<BudgetReport> {
    let spent = spent_in_period(
        transactions,
        budget.category_id,
        &budget.period,
        &budget.limit.currency,
    )?;
    let remaining = budget.limit.checked_sub(&spent)?;
    let standing = if remaining.is_negative() {
        BudgetStanding::OverBudget
    } else if remaining.is_zero() {
        BudgetStanding::OnTrack
    } else {
        BudgetStanding::UnderBudget
    };
    Ok(BudgetReport {
        budget_id: budget.id,
        category_id: budget.category_id,
        period: budget.period,
        limit: budget.limit.clone(),
        spent,
        remaining,
        standing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn usd(minor_units: i64) -> Money {
        Money::new(minor_units, CurrencyCode::new("USD"))
    }

    fn march_txn(category: Uuid, minor_units: i64, day: u32) -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            Some(category),
            usd(minor_units),
            NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
        )
    }

    #[test]
    fn spent_ignores_deleted_and_out_of_period() {
        let category = Uuid::new_v4();
        let march = Period::month(2026, 3).unwrap();
        let mut deleted = march_txn(category, 999, 5);
        deleted.deleted = true;
        let mut april = march_txn(category, 500, 1);
        april.date = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let txns = vec![march_txn(category, 1000, 2), deleted, april];

        let spent = spent_in_period(&txns, category, &march, &CurrencyCode::new("USD")).unwrap();
        assert_eq!(spent.minor_units, 1000);
    }

    #[test]
    fn cross_currency_aggregation_is_rejected() {
        let category = Uuid::new_v4();
        let march = Period::month(2026, 3).unwrap();
        let mut txn = march_txn(category, 1000, 2);
        txn.amount = Money::new(1000, CurrencyCode::new("EUR"));

        let err = spent_in_period(&[txn], category, &march, &CurrencyCode::new("USD")).unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedConversion { .. }));
    }

    #[test]
    fn status_reports_overspend_without_clamping() {
        let category = Uuid::new_v4();
        let budget = Budget::new(category, Period::month(2026, 3).unwrap(), usd(5000));
        let txns = vec![
            march_txn(category, 1500, 3),
            march_txn(category, 1500, 10),
            march_txn(category, 4000, 20),
        ];

        let report = status(&budget, &txns).unwrap();
        assert_eq!(report.spent.minor_units, 7000);
        assert_eq!(report.remaining.minor_units, -2000);
        assert_eq!(report.standing, BudgetStanding::OverBudget);
    }

    #[test]
    fn status_on_exact_limit_is_on_track() {
        let category = Uuid::new_v4();
        let budget = Budget::new(category, Period::month(2026, 3).unwrap(), usd(3000));
        let report = status(&budget, &[march_txn(category, 3000, 1)]).unwrap();
        assert_eq!(report.standing, BudgetStanding::OnTrack);
        assert!(report.remaining.is_zero());
    }
}
