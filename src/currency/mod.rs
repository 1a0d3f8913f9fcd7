//! Fixed-precision monetary values and locale-aware formatting.
//!
//! All amounts are stored as integer minor units (cents for USD). Floating
//! point never enters arithmetic; formatting is a pure read-side projection
//! and cannot corrupt stored values.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct CurrencyInfo {
    minor_units: u32,
    symbol: &'static str,
}

static CURRENCY_REGISTRY: Lazy<HashMap<&'static str, CurrencyInfo>> = Lazy::new(|| {
    let mut registry = HashMap::new();
    let mut insert = |code, minor_units, symbol| {
        registry.insert(code, CurrencyInfo { minor_units, symbol });
    };
    insert("USD", 2, "$");
    insert("EUR", 2, "€");
    insert("GBP", 2, "£");
    insert("RUB", 2, "₽");
    insert("JPY", 0, "¥");
    insert("CHF", 2, "CHF");
    insert("AUD", 2, "A$");
    insert("CAD", 2, "CA$");
    insert("KWD", 3, "KWD");
    insert("BHD", 3, "BHD");
    registry
});

/// Number of minor-unit digits for the given currency. Unknown codes fall
/// back to two, matching the common case.
pub fn minor_units_for(code: &str) -> u32 {
    CURRENCY_REGISTRY
        .get(code)
        .map(|info| info.minor_units)
        .unwrap_or(2)
}

pub fn symbol_for(code: &str) -> &str {
    CURRENCY_REGISTRY
        .get(code)
        .map(|info| info.symbol)
        .unwrap_or(code)
}

/// A signed monetary amount in integer minor units of a single currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Money {
    pub minor_units: i64,
    pub currency: CurrencyCode,
}

impl Money {
    pub fn new(minor_units: i64, currency: CurrencyCode) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        Self::new(0, currency)
    }

    /// Parses a decimal string like `"12.34"` or `"-0.5"` into minor units.
    ///
    /// Rejects malformed input and fractional digits beyond the currency's
    /// minor-unit count; shorter fractions are padded (`"12.3"` USD → 1230).
    pub fn parse(raw: &str, currency: CurrencyCode) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::InvalidAmount("empty amount".into()));
        }
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let mut parts = body.splitn(2, '.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next().unwrap_or("");
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(LedgerError::InvalidAmount(format!("`{raw}` has no digits")));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(LedgerError::InvalidAmount(format!(
                "`{raw}` contains non-numeric characters"
            )));
        }
        let precision = minor_units_for(currency.as_str()) as usize;
        if frac_part.len() > precision {
            return Err(LedgerError::InvalidAmount(format!(
                "`{raw}` exceeds {precision} minor-unit digit(s) for {currency}"
            )));
        }
        let scale = 10i64.pow(precision as u32);
        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| LedgerError::InvalidAmount(format!("`{raw}` is out of range")))?
        };
        let mut frac: i64 = if frac_part.is_empty() {
            0
        } else {
            frac_part
                .parse()
                .map_err(|_| LedgerError::InvalidAmount(format!("`{raw}` is out of range")))?
        };
        frac *= 10i64.pow((precision - frac_part.len()) as u32);
        let magnitude = whole
            .checked_mul(scale)
            .and_then(|units| units.checked_add(frac))
            .ok_or_else(|| LedgerError::InvalidAmount(format!("`{raw}` is out of range")))?;
        let minor_units = if negative { -magnitude } else { magnitude };
        Ok(Self::new(minor_units, currency))
    }

    pub fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    pub fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    pub fn negated(&self) -> Self {
        Self::new(-self.minor_units, self.currency.clone())
    }

    /// Adds two amounts, failing when currencies differ.
    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.require_same_currency(other)?;
        let sum = self
            .minor_units
            .checked_add(other.minor_units)
            .ok_or_else(|| LedgerError::InvalidAmount("amount overflow".into()))?;
        Ok(Money::new(sum, self.currency.clone()))
    }

    /// Subtracts `other` from `self`, failing when currencies differ.
    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.require_same_currency(other)?;
        let diff = self
            .minor_units
            .checked_sub(other.minor_units)
            .ok_or_else(|| LedgerError::InvalidAmount("amount overflow".into()))?;
        Ok(Money::new(diff, self.currency.clone()))
    }

    pub fn require_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(LedgerError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            });
        }
        Ok(())
    }
}

/// Locale-aware formatting preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    pub language_tag: String,
    pub decimal_separator: char,
    pub grouping_separator: char,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            language_tag: "en-US".into(),
            decimal_separator: '.',
            grouping_separator: ',',
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NegativeStyle {
    Sign,
    Parentheses,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CurrencyDisplay {
    Symbol,
    Code,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatOptions {
    pub currency_display: CurrencyDisplay,
    pub negative_style: NegativeStyle,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            currency_display: CurrencyDisplay::Symbol,
            negative_style: NegativeStyle::Sign,
        }
    }
}

/// Renders a monetary amount for display. Never mutates the amount.
pub fn format_money(money: &Money, locale: &LocaleConfig, options: &FormatOptions) -> String {
    let precision = minor_units_for(money.currency.as_str());
    let scale = 10i64.pow(precision);
    let magnitude = money.minor_units.unsigned_abs() as i64;
    let whole = magnitude / scale;
    let frac = magnitude % scale;

    let mut body = group_digits(&whole.to_string(), locale.grouping_separator);
    if precision > 0 {
        body.push(locale.decimal_separator);
        body.push_str(&format!("{:0width$}", frac, width = precision as usize));
    }
    if money.minor_units < 0 {
        body = match options.negative_style {
            NegativeStyle::Sign => format!("-{body}"),
            NegativeStyle::Parentheses => format!("({body})"),
        };
    }
    match options.currency_display {
        CurrencyDisplay::Symbol => format!("{}{}", symbol_for(money.currency.as_str()), body),
        CurrencyDisplay::Code => format!("{} {}", money.currency.as_str(), body),
    }
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::new();
    let mut count = 0;
    for ch in digits.chars().rev() {
        if count != 0 && count % 3 == 0 {
            grouped.insert(0, separator);
        }
        grouped.insert(0, ch);
        count += 1;
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(minor_units: i64) -> Money {
        Money::new(minor_units, CurrencyCode::new("USD"))
    }

    #[test]
    fn parse_whole_and_fractional_amounts() {
        let code = CurrencyCode::new("USD");
        assert_eq!(Money::parse("10", code.clone()).unwrap().minor_units, 1000);
        assert_eq!(Money::parse("12.34", code.clone()).unwrap().minor_units, 1234);
        assert_eq!(Money::parse("12.3", code.clone()).unwrap().minor_units, 1230);
        assert_eq!(Money::parse("-0.05", code.clone()).unwrap().minor_units, -5);
        assert_eq!(Money::parse(".5", code).unwrap().minor_units, 50);
    }

    #[test]
    fn parse_honors_currency_precision() {
        let yen = CurrencyCode::new("JPY");
        assert_eq!(Money::parse("500", yen.clone()).unwrap().minor_units, 500);
        assert!(matches!(
            Money::parse("500.1", yen),
            Err(LedgerError::InvalidAmount(_))
        ));
        let dinar = CurrencyCode::new("KWD");
        assert_eq!(Money::parse("1.250", dinar).unwrap().minor_units, 1250);
    }

    #[test]
    fn parse_rejects_garbage() {
        let code = CurrencyCode::new("USD");
        for raw in ["", "  ", "abc", "1.2.3", "12,34", "1e5", "."] {
            assert!(
                matches!(Money::parse(raw, code.clone()), Err(LedgerError::InvalidAmount(_))),
                "expected `{raw}` to be rejected"
            );
        }
    }

    #[test]
    fn arithmetic_requires_matching_currencies() {
        let dollars = usd(100);
        let euros = Money::new(100, CurrencyCode::new("EUR"));
        assert!(matches!(
            dollars.checked_add(&euros),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
        assert!(matches!(
            dollars.checked_sub(&euros),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
        assert_eq!(dollars.checked_add(&usd(50)).unwrap().minor_units, 150);
        assert_eq!(dollars.checked_sub(&usd(150)).unwrap().minor_units, -50);
    }

    #[test]
    fn format_groups_and_places_symbol() {
        let locale = LocaleConfig::default();
        let options = FormatOptions::default();
        assert_eq!(format_money(&usd(123_456_789), &locale, &options), "$1,234,567.89");
        assert_eq!(format_money(&usd(-5), &locale, &options), "$-0.05");
    }

    #[test]
    fn format_respects_locale_and_options() {
        let locale = LocaleConfig {
            language_tag: "de-DE".into(),
            decimal_separator: ',',
            grouping_separator: '.',
        };
        let options = FormatOptions {
            currency_display: CurrencyDisplay::Code,
            negative_style: NegativeStyle::Parentheses,
        };
        let amount = Money::new(-1_234_56, CurrencyCode::new("EUR"));
        assert_eq!(format_money(&amount, &locale, &options), "EUR (1.234,56)");
    }

    #[test]
    fn format_zero_precision_currency_omits_fraction() {
        let yen = Money::new(1500, CurrencyCode::new("JPY"));
        let rendered = format_money(&yen, &LocaleConfig::default(), &FormatOptions::default());
        assert_eq!(rendered, "¥1,500");
    }
}
