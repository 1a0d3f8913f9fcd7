use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

pub(crate) const MAX_NAME_LEN: usize = 200;

/// Exposes a stable identifier for entities stored in the ledger.
pub trait Identifiable {
    fn id(&self) -> uuid::Uuid;
}

/// Creation and mutation timestamps carried by every entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditStamp {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditStamp {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for AuditStamp {
    fn default() -> Self {
        Self::now()
    }
}

/// Half-open date range `[start, end)` used for budget periods and reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end <= start {
            return Err(LedgerError::validation(
                "period",
                "period end must be after start",
            ));
        }
        Ok(Self { start, end })
    }

    /// Calendar month, e.g. `Period::month(2026, 3)` covers all of March.
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| LedgerError::validation("period", format!("invalid month {month}")))?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| LedgerError::validation("period", "invalid month rollover"))?;
        Ok(Self { start, end })
    }

    pub fn year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| LedgerError::validation("period", format!("invalid year {year}")))?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)
            .ok_or_else(|| LedgerError::validation("period", format!("invalid year {year}")))?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        // month() cannot fail for a date that already exists
        Self::month(date.year(), date.month()).expect("valid month from existing date")
    }
}

pub(crate) fn validate_name(field: &'static str, name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(field, "name must not be empty"));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(LedgerError::validation(
            field,
            format!("name must not exceed {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_period_covers_whole_month() {
        let march = Period::month(2026, 3).unwrap();
        assert!(march.contains(date(2026, 3, 1)));
        assert!(march.contains(date(2026, 3, 31)));
        assert!(!march.contains(date(2026, 4, 1)));
        assert!(!march.contains(date(2026, 2, 28)));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let december = Period::month(2025, 12).unwrap();
        assert_eq!(december.end, date(2026, 1, 1));
    }

    #[test]
    fn overlap_is_symmetric_and_excludes_adjacency() {
        let march = Period::month(2026, 3).unwrap();
        let april = Period::month(2026, 4).unwrap();
        let q1 = Period::custom(date(2026, 1, 1), date(2026, 4, 1)).unwrap();
        assert!(!march.overlaps(&april));
        assert!(!april.overlaps(&march));
        assert!(march.overlaps(&q1));
        assert!(q1.overlaps(&march));
    }

    #[test]
    fn custom_period_rejects_inverted_range() {
        let err = Period::custom(date(2026, 5, 1), date(2026, 4, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "period", .. }));
    }
}
