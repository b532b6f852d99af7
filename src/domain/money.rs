//! Fixed-scale rounding for ledger amounts and conversion rates.
//!
//! Money is kept at 3 decimal places and rates at 6. Rounding is always
//! half-away-from-zero so that replaying the same events reproduces the
//! same balance chain digit for digit.

use bigdecimal::{BigDecimal, Zero};
use std::str::FromStr;

/// Scale of every base-currency amount stored in the ledger.
pub const MONEY_SCALE: i64 = 3;

/// Scale of a captured conversion rate.
pub const RATE_SCALE: i64 = 6;

/// Rounds `value` to `scale` decimal places, ties away from zero.
pub fn round_half_away(value: &BigDecimal, scale: i64) -> BigDecimal {
    // with_scale truncates toward zero
    let truncated = value.with_scale(scale);
    let remainder = (value - &truncated).abs();
    let half_unit = BigDecimal::new(5.into(), scale + 1);

    if remainder < half_unit {
        return truncated;
    }

    let unit = BigDecimal::new(1.into(), scale);
    if value < &BigDecimal::zero() {
        truncated - unit
    } else {
        truncated + unit
    }
}

pub fn round_money(value: &BigDecimal) -> BigDecimal {
    round_half_away(value, MONEY_SCALE)
}

pub fn round_rate(value: &BigDecimal) -> BigDecimal {
    round_half_away(value, RATE_SCALE)
}

/// Converts a JSON number into an exact decimal.
///
/// Goes through the number's textual form so that `0.9` stays `0.9` instead
/// of picking up binary floating point noise.
pub fn decimal_from_json(number: &serde_json::Number) -> Option<BigDecimal> {
    BigDecimal::from_str(&number.to_string()).ok()
}

/// Converts an amount expressed in minor units (cents) into major units.
pub fn from_minor_units(minor: u64) -> BigDecimal {
    BigDecimal::new(minor.into(), 2)
}

/// Upper-cases an ISO 4217 style code, or `None` unless it is exactly three
/// ASCII letters. Ledger currency columns are `VARCHAR(3)`.
pub fn currency_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(code.to_ascii_uppercase())
}
