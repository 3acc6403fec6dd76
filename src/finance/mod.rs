//! Deal arithmetic: sales tax, loan payments and trade equity.
//!
//! Everything here is a pure function of its inputs. Search loops work in
//! `f64`; anything reported back to a caller is converted to `Decimal`
//! through the rounding helpers below.

pub mod payment;
pub mod tax;
pub mod trade;

use rust_decimal::prelude::*;

use crate::types::DeskError;

/// Convert to `Decimal`, rejecting NaN and infinities.
pub fn to_decimal(value: f64, field: &'static str) -> Result<Decimal, DeskError> {
    Decimal::from_f64(value).ok_or(DeskError::NonFinite { field })
}

/// Round to cents, half away from zero.
pub fn round_cents(value: f64, field: &'static str) -> Result<Decimal, DeskError> {
    Ok(to_decimal(value, field)?.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Round to whole dollars, half away from zero.
pub fn round_dollars(value: f64, field: &'static str) -> Result<Decimal, DeskError> {
    Ok(to_decimal(value, field)?.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
}
