//! Money representation.
//!
//! Amounts are stored as `i64` centavos so that balance increments are exact integer
//! arithmetic inside the database. Conversions from `Decimal` round half-to-even to the cent.

use crate::errors::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Principal unit the profit formula is expressed in (R$200).
const PROFIT_UNIT: i64 = 200;
/// Profit paid per cycle for each unit (R$40).
const PROFIT_PER_UNIT: i64 = 40;

/// Converts reais to centavos, rounding half-to-even.
pub fn to_cents(amount: Decimal) -> Result<i64> {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    rounded
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| Error::validation(format!("Amount out of range: {amount}")))
}

/// Converts centavos to reais with two decimal places.
#[must_use]
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Rejects `amount` unless `min <= amount <= max`.
///
/// The comparison uses the amount as given, before any rounding to the cent, so a sub-cent
/// amount just outside a bound cannot round its way in.
pub fn check_bounds(amount: Decimal, min: Decimal, max: Decimal) -> Result<()> {
    if amount < min || amount > max {
        return Err(Error::InvalidAmount { amount, min, max });
    }
    Ok(())
}

/// Rounds a decimal number of centavos half-to-even to a whole centavo.
pub fn round_cents(cents: Decimal) -> Result<i64> {
    cents
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
        .ok_or_else(|| Error::validation(format!("Amount out of range: {cents}")))
}

/// Profit credited per cycle: `amount / 200 * 40`.
pub fn profit_per_cycle(amount_cents: i64) -> Result<i64> {
    let exact =
        Decimal::from(amount_cents) / Decimal::from(PROFIT_UNIT) * Decimal::from(PROFIT_PER_UNIT);
    round_cents(exact)
}

/// Applies a percentage to an amount in centavos.
pub fn percent_of(amount_cents: i64, percent: Decimal) -> Result<i64> {
    round_cents(Decimal::from(amount_cents) * percent / Decimal::ONE_HUNDRED)
}
