#![allow(dead_code)]

use budgetbook::{Category, CategoryKind, CurrencyCode, LedgerEngine, MemoryStore, Money};
use chrono::NaiveDate;

pub fn engine() -> LedgerEngine<MemoryStore> {
    LedgerEngine::new(MemoryStore::new())
}

pub fn usd(minor_units: i64) -> Money {
    Money::new(minor_units, CurrencyCode::new("USD"))
}

pub fn eur(minor_units: i64) -> Money {
    Money::new(minor_units, CurrencyCode::new("EUR"))
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn groceries(engine: &LedgerEngine<MemoryStore>) -> Category {
    engine
        .create_category("Groceries", CategoryKind::Expense, None)
        .unwrap()
}
