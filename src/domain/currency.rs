use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Amount, round2};

/// Every rate in the table is expressed in this currency.
pub const PIVOT_CURRENCY: &str = "UAH";

/// A currency code that is not present in the rate table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rates for currency {0} not found")]
pub struct UnknownCurrency(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error(transparent)]
    UnknownCurrency(#[from] UnknownCurrency),

    #[error("Converting {amount} {from} to {to} exceeds the representable range")]
    OutOfRange {
        amount: Decimal,
        from: String,
        to: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateTableError {
    #[error("Rate for {currency} must be positive, got {rate}")]
    NonPositiveRate { currency: String, rate: Decimal },

    #[error("Pivot currency UAH must have rate 1, got {0}")]
    PivotRate(Decimal),

    #[error("Invalid currency code '{0}': expected three letters")]
    InvalidCode(String),

    #[error("Currency {0} is listed more than once")]
    DuplicateCode(String),
}

/// Canonical form of a currency code: trimmed and uppercase.
pub fn canonical_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Currency -> UAH exchange rates.
///
/// The table is immutable once built. Conversions always go through the
/// pivot: `amount * rate(from) / rate(to)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Decimal>", into = "BTreeMap<String, Decimal>")]
pub struct RateTable {
    rates: BTreeMap<String, Decimal>,
}

impl RateTable {
    /// The rates the desk ships with.
    pub fn seeded() -> Self {
        let rates = [
            (PIVOT_CURRENCY, Decimal::ONE),
            ("USD", Decimal::new(4126, 2)),
            ("EUR", Decimal::new(4823, 2)),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();
        Self { rates }
    }

    /// Build a table from arbitrary `(code, rate)` pairs. Codes are
    /// canonicalized; the pivot is added at 1 when missing.
    pub fn from_rates<I, S>(pairs: I) -> Result<Self, RateTableError>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut rates = BTreeMap::new();
        for (code, rate) in pairs {
            let code = canonical_code(code.as_ref());
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(RateTableError::InvalidCode(code));
            }
            if rate <= Decimal::ZERO {
                return Err(RateTableError::NonPositiveRate {
                    currency: code,
                    rate,
                });
            }
            if code == PIVOT_CURRENCY && rate != Decimal::ONE {
                return Err(RateTableError::PivotRate(rate));
            }
            if rates.contains_key(&code) {
                return Err(RateTableError::DuplicateCode(code));
            }
            rates.insert(code, rate);
        }
        rates
            .entry(PIVOT_CURRENCY.to_string())
            .or_insert(Decimal::ONE);
        Ok(Self { rates })
    }

    /// UAH-denominated rate for a canonical code. Exact match only.
    pub fn rate(&self, currency: &str) -> Result<Decimal, UnknownCurrency> {
        self.rates
            .get(currency)
            .copied()
            .ok_or_else(|| UnknownCurrency(currency.to_string()))
    }

    pub fn contains(&self, currency: &str) -> bool {
        self.rates.contains_key(currency)
    }

    /// Convert `amount` between two registered currencies, rounded to 2dp half-up.
    /// Both codes are looked up before any arithmetic happens.
    pub fn convert(&self, from: &str, to: &str, amount: Amount) -> Result<Amount, ConversionError> {
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        from_rate
            .checked_div(to_rate)
            .and_then(|ratio| amount.checked_mul(ratio))
            .map(round2)
            .ok_or_else(|| ConversionError::OutOfRange {
                amount,
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    /// All rates ordered by currency code.
    pub fn list_rates(&self) -> Vec<(String, Decimal)> {
        self.rates
            .iter()
            .map(|(code, rate)| (code.clone(), *rate))
            .collect()
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::seeded()
    }
}

impl TryFrom<BTreeMap<String, Decimal>> for RateTable {
    type Error = RateTableError;

    fn try_from(map: BTreeMap<String, Decimal>) -> Result<Self, Self::Error> {
        Self::from_rates(map)
    }
}

impl From<RateTable> for BTreeMap<String, Decimal> {
    fn from(table: RateTable) -> Self {
        table.rates
    }
}
