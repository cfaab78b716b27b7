use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Money is held as an exact decimal. Balances produced by transfers and
/// conversions are kept at two decimal places.
pub type Amount = Decimal;

/// Round to two decimal places, half-up (midpoint away from zero).
/// Example: 10.005 -> 10.01, 10.004 -> 10.00
pub fn round2(amount: Amount) -> Amount {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for display with exactly two decimals.
/// Example: 937 -> "937.00", 10.005 -> "10.01"
pub fn format_amount(amount: Amount) -> String {
    format!("{:.2}", round2(amount))
}

/// Parse a user supplied decimal string.
/// Example: "50" -> 50, "12.5" -> 12.5, "-3.20" -> -3.20
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::Empty);
    }
    // Accept a decimal comma, operators type it often enough
    let normalized = input.replace(',', ".");
    Decimal::from_str(&normalized).map_err(|_| ParseAmountError::InvalidFormat(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat(String),
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "amount is empty"),
            ParseAmountError::InvalidFormat(s) => write!(f, "invalid amount '{}'", s),
        }
    }
}

impl std::error::Error for ParseAmountError {}
