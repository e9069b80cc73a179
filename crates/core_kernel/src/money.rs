//! Money helpers with precise decimal arithmetic
//!
//! Every amount in the system (charges, payments, refunds, coverage) is a
//! `rust_decimal::Decimal` persisted as `NUMERIC(12, 2)`. This module holds
//! the rounding rule and the percentage type used by co-pay calculations.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of decimal places stored for every monetary amount
pub const MONEY_DP: u32 = 2;

/// Largest amount a `NUMERIC(12, 2)` column holds: 9,999,999,999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, MONEY_DP);

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid percentage: {0} (must be between 0 and 100)")]
    InvalidPercentage(Decimal),

    #[error("Amount exceeds the maximum of {}", MAX_AMOUNT)]
    AmountTooLarge,
}

/// Rounds an amount to cents, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the amount if it does not exceed [`MAX_AMOUNT`]
pub fn ensure_storable(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount > MAX_AMOUNT {
        return Err(MoneyError::AmountTooLarge);
    }
    Ok(amount)
}

/// Returns the amount if it is strictly positive and storable
pub fn ensure_positive(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount(format!(
            "{} must be greater than zero",
            amount
        )));
    }
    ensure_storable(amount)
}

/// Returns the amount if it is zero or positive and storable
pub fn ensure_non_negative(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::InvalidAmount(format!(
            "{} must not be negative",
            amount
        )));
    }
    ensure_storable(amount)
}

/// `unit_price * quantity` rounded to cents, if the result is storable
pub fn line_total(unit_price: Decimal, quantity: i32) -> Result<Decimal, MoneyError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .ok_or(MoneyError::AmountTooLarge)
        .and_then(ensure_storable)
}

/// Sums amounts, failing once the running total is no longer storable
pub fn checked_total<I>(amounts: I) -> Result<Decimal, MoneyError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount)
            .ok_or(MoneyError::AmountTooLarge)
            .and_then(ensure_storable)
    })
}

/// Represents a percentage rate (e.g., a 20% co-pay)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// The rate as a decimal (e.g., 0.20 for 20%)
    value: Decimal,
}

impl Rate {
    /// Creates a rate from a decimal value (e.g., 0.05 for 5%)
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Creates a rate from a percentage (e.g., 5.0 for 5%)
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidPercentage` outside `0..=100`
    pub fn from_percentage(percentage: Decimal) -> Result<Self, MoneyError> {
        if percentage < Decimal::ZERO || percentage > dec!(100) {
            return Err(MoneyError::InvalidPercentage(percentage));
        }
        Ok(Self {
            value: percentage / dec!(100),
        })
    }

    /// Returns the rate as a decimal
    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    /// Returns the rate as a percentage
    pub fn as_percentage(&self) -> Decimal {
        self.value * dec!(100)
    }

    /// Returns true if the rate is zero
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Applies this rate to an amount, rounded to cents
    pub fn apply(&self, amount: Decimal) -> Decimal {
        round_money(amount * self.value)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().round_dp(4))
    }
}
