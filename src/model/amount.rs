//! Amount type for handling the monetary value of a transaction.
//!
//! This module provides the `Amount` type which wraps `Decimal`, rejects negative values, and
//! handles parsing values that may or may not include a dollar sign and commas.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Represents the non-negative monetary value of a single transaction.
///
/// Income and expenses are both recorded as positive amounts; the direction comes from which
/// partition of the project the transaction lives in.
///
/// # Examples
///
/// ```
/// # use foundation_ledger::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("$1,250.50").unwrap();
/// assert_eq!(amount.to_string(), "1,250.50");
/// assert!(Amount::from_str("-5").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

/// The largest amount accepted as new input: one quadrillion.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

impl Amount {
    /// Creates a new `Amount`, returning an error if `value` is negative or above `MAX_AMOUNT`.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        let amount = Self::non_negative(value)?;
        if value > Decimal::from(MAX_AMOUNT) {
            return Err(AmountError::TooLarge(value));
        }
        Ok(amount)
    }

    /// Only rejects negative values. Used for documents that are already stored, which may have
    /// been written without the upper bound.
    fn non_negative(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

/// An error that can occur when parsing strings into `Amount` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    Empty,
    Negative(Decimal),
    TooLarge(Decimal),
    Invalid(String),
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Empty => write!(f, "An amount is required"),
            AmountError::Negative(value) => {
                write!(f, "The amount must not be negative, got {value}")
            }
            AmountError::TooLarge(value) => {
                write!(f, "The amount must not be more than {MAX_AMOUNT}, got {value}")
            }
            AmountError::Invalid(s) => write!(f, "'{s}' is not a valid amount"),
        }
    }
}

impl std::error::Error for AmountError {}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::new(parse_decimal(s)?)
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, AmountError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let without_dollar = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let without_commas = without_dollar.replace(',', "");

    Decimal::from_str(&without_commas)
        .or_else(|_| Decimal::from_scientific(&without_commas))
        .map_err(|_| AmountError::Invalid(trimmed.to_string()))
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_money(self.0))
    }
}

/// Formats a decimal with thousands separators and two decimal places, e.g. `-60,000.00`. Used
/// for amounts and for totals, which may be negative.
pub fn format_money(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let num = rounded.abs().to_f64().unwrap_or_default();
    format!("{sign}{}", format_num::format_num!(",.2", num))
}

/// `format_money` with a currency symbol placed after the sign, e.g. `-$60,000.00`.
pub fn format_currency(value: Decimal, symbol: &str) -> String {
    let money = format_money(value);
    match money.strip_prefix('-') {
        Some(abs) => format!("-{symbol}{abs}"),
        None => format!("{symbol}{money}"),
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // A string keeps the exact decimal value.
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Documents written by older clients hold plain JSON numbers.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let s = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        parse_decimal(&s)
            .and_then(Amount::non_negative)
            .map_err(serde::de::Error::custom)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}
