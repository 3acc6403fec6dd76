//! Provincial sales tax.
//!
//! One flat rate per province, applied to the sale price less the trade-in
//! credit. Status purchasers are exempt. PPSA lien-registration fees live
//! here as well since they are keyed by the same province codes.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::finance::to_decimal;
use crate::types::DeskError;

// ---------------------------------------------------------------------------
// Provinces
// ---------------------------------------------------------------------------

/// Provinces with a sales-tax rate on file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Province {
    AB,
    BC,
    SK,
    MB,
    ON,
    QC,
    NS,
    NB,
    PE,
    NL,
}

impl Province {
    pub const ALL: &'static [Province] = &[
        Province::AB,
        Province::BC,
        Province::SK,
        Province::MB,
        Province::ON,
        Province::QC,
        Province::NS,
        Province::NB,
        Province::PE,
        Province::NL,
    ];

    /// Combined sales-tax rate on a used-vehicle sale.
    pub fn tax_rate(&self) -> Decimal {
        match self {
            Province::AB => dec!(0.05),
            Province::BC => dec!(0.12),
            Province::SK => dec!(0.11),
            Province::MB => dec!(0.12),
            Province::ON => dec!(0.13),
            Province::QC => dec!(0.14975),
            Province::NS | Province::NB | Province::PE | Province::NL => dec!(0.15),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Province::AB => "AB",
            Province::BC => "BC",
            Province::SK => "SK",
            Province::MB => "MB",
            Province::ON => "ON",
            Province::QC => "QC",
            Province::NS => "NS",
            Province::NB => "NB",
            Province::PE => "PE",
            Province::NL => "NL",
        }
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Parse a province code (case-insensitive, surrounding whitespace ignored).
impl FromStr for Province {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        Province::ALL
            .iter()
            .copied()
            .find(|p| p.code() == code)
            .ok_or_else(|| DeskError::UnknownProvince(s.to_string()))
    }
}

/// PPSA lien-registration fee for a province or territory.
/// Unknown codes fall back to Alberta's fee.
pub fn ppsa_fee(code: &str) -> Decimal {
    match code.trim().to_uppercase().as_str() {
        "AB" => dec!(38.73),
        "BC" => dec!(40.00),
        "SK" | "MB" => dec!(35.00),
        "ON" => dec!(65.00),
        "QC" => dec!(0.00),
        "NB" | "NS" | "PE" | "NL" => dec!(50.00),
        "YT" | "NT" | "NU" => dec!(35.00),
        _ => dec!(38.73),
    }
}

// ---------------------------------------------------------------------------
// Tax calculation
// ---------------------------------------------------------------------------

/// Tax owing on a sale, in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxResult {
    pub tax_rate: Decimal,
    pub taxable_base: Decimal,
    pub total_tax: Decimal,
    /// Tax avoided by crediting the trade against the taxable base.
    pub tax_savings_with_trade: Decimal,
}

impl TaxResult {
    fn exempt(sale_price: Decimal) -> Self {
        Self {
            tax_rate: Decimal::ZERO,
            taxable_base: sale_price,
            total_tax: Decimal::ZERO,
            tax_savings_with_trade: Decimal::ZERO,
        }
    }
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute sales tax for a sale with a trade-in credit.
///
/// The trade credit applies identically in every province.
pub fn compute(
    sale_price: f64,
    trade_in_credit: f64,
    province: &str,
    is_tax_exempt: bool,
) -> Result<TaxResult, DeskError> {
    let price = to_decimal(sale_price, "sale_price")?;
    if is_tax_exempt {
        return Ok(TaxResult::exempt(cents(price)));
    }

    let rate = Province::from_str(province)?.tax_rate();
    let credit = to_decimal(trade_in_credit, "trade_in_credit")?;

    let taxable_base = price - credit;
    let total_tax = taxable_base * rate;
    let tax_without_trade = price * rate;

    Ok(TaxResult {
        tax_rate: rate,
        taxable_base: cents(taxable_base),
        total_tax: cents(total_tax),
        tax_savings_with_trade: cents(tax_without_trade - total_tax),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alberta_gst_only() {
        let r = compute(30_000.0, 0.0, "AB", false).unwrap();
        assert_eq!(r.tax_rate, dec!(0.05));
        assert_eq!(r.taxable_base, dec!(30000));
        assert_eq!(r.total_tax, dec!(1500));
        assert_eq!(r.tax_savings_with_trade, Decimal::ZERO);
    }

    #[test]
    fn test_trade_credit_reduces_tax() {
        let r = compute(30_000.0, 10_000.0, "ON", false).unwrap();
        assert_eq!(r.taxable_base, dec!(20000));
        assert_eq!(r.total_tax, dec!(2600));
        assert_eq!(r.tax_savings_with_trade, dec!(1300));
    }

    #[test]
    fn test_quebec_rounds_to_cents() {
        let r = compute(10_000.55, 0.0, "QC", false).unwrap();
        // 10000.55 * 0.14975 = 1497.6123...
        assert_eq!(r.total_tax, dec!(1497.61));
    }

    #[test]
    fn test_lowercase_code_accepted() {
        let r = compute(1_000.0, 0.0, " bc ", false).unwrap();
        assert_eq!(r.total_tax, dec!(120));
    }

    #[test]
    fn test_unknown_province_errors() {
        let err = compute(20_000.0, 0.0, "ZZ", false).unwrap_err();
        assert!(matches!(err, DeskError::UnknownProvince(ref c) if c == "ZZ"));
    }

    #[test]
    fn test_exempt_zeroes_tax_and_skips_province_lookup() {
        let r = compute(25_000.0, 5_000.0, "ZZ", true).unwrap();
        assert_eq!(r.tax_rate, Decimal::ZERO);
        assert_eq!(r.total_tax, Decimal::ZERO);
        assert_eq!(r.tax_savings_with_trade, Decimal::ZERO);
        assert_eq!(r.taxable_base, dec!(25000));
    }

    #[test]
    fn test_nan_price_is_fault() {
        assert!(matches!(
            compute(f64::NAN, 0.0, "AB", false),
            Err(DeskError::NonFinite { field: "sale_price" })
        ));
    }

    #[test]
    fn test_every_province_has_rate() {
        for p in Province::ALL {
            assert!(p.tax_rate() > Decimal::ZERO, "{p} missing rate");
            assert_eq!(p.code().parse::<Province>().unwrap(), *p);
        }
    }

    #[test]
    fn test_ppsa_fee_lookup() {
        assert_eq!(ppsa_fee("on"), dec!(65));
        assert_eq!(ppsa_fee("QC"), Decimal::ZERO);
        assert_eq!(ppsa_fee("YT"), dec!(35));
        assert_eq!(ppsa_fee("??"), dec!(38.73));
    }
}
