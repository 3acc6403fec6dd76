//! Debt service and loan-to-value checks against a lender program.
//!
//! A program's front cap factor doubles as its LTV ceiling (a 1.40 factor
//! is a 140% LTV program). DSR is the monthly payment as a share of the
//! customer's monthly income. Both are reported in percent, to the cent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::finance::round_cents;
use crate::lenders::rules::LenderRuleSet;
use crate::types::DeskError;

/// LTV above which a deal is warned about regardless of the program.
pub const HIGH_LTV_PERCENT: f64 = 130.0;

/// Share of the DSR ceiling past which a deal is warned about.
const DSR_WARNING_SHARE: f64 = 0.9;

/// Something a desk manager should look at before booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComplianceWarning {
    HighDsr { dsr: Decimal, max_dsr: f64 },
    HighLtv { ltv: Decimal },
    /// DSR and LTV are both over their limits.
    Marginal,
}

impl fmt::Display for ComplianceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceWarning::HighDsr { dsr, max_dsr } => write!(f, "high DSR: {dsr}% (max {max_dsr}%)"),
            ComplianceWarning::HighLtv { ltv } => write!(f, "high LTV: {ltv}%"),
            ComplianceWarning::Marginal => write!(f, "marginal deal: DSR and LTV both over limit"),
        }
    }
}

/// Outcome of checking one deal against its program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub dsr: Decimal,
    pub dsr_pass: bool,
    pub ltv: Decimal,
    pub ltv_pass: bool,
    pub income_pass: bool,
    pub warnings: Vec<ComplianceWarning>,
}

impl ComplianceReport {
    pub fn passes(&self) -> bool {
        self.dsr_pass && self.ltv_pass && self.income_pass
    }
}

/// The figures of a structured deal that the lender underwrites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DealFigures {
    pub monthly_payment: f64,
    pub monthly_income: f64,
    pub amount_financed: f64,
    pub black_book: f64,
}

/// Program ceilings, in percent, and the income floor. `None` means the
/// program sets no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComplianceLimits {
    pub max_ltv: Option<f64>,
    pub max_dsr: Option<f64>,
    pub min_income: Option<f64>,
}

impl ComplianceLimits {
    /// Limits for a deal under `rule`. An approval-level front cap
    /// override replaces the program's LTV ceiling.
    pub fn for_deal(rule: Option<&LenderRuleSet>, front_cap_override: Option<f64>) -> Self {
        Self {
            max_ltv: front_cap_override
                .or(rule.and_then(|r| r.front_cap_factor))
                .map(|factor| factor * 100.0),
            max_dsr: rule.and_then(|r| r.max_dsr),
            min_income: rule.and_then(|r| r.min_income),
        }
    }

    pub fn check(&self, deal: &DealFigures) -> Result<ComplianceReport, DeskError> {
        let dsr = if deal.monthly_income > 0.0 {
            deal.monthly_payment / deal.monthly_income * 100.0
        } else {
            0.0
        };
        let ltv = if deal.black_book > 0.0 {
            deal.amount_financed / deal.black_book * 100.0
        } else {
            0.0
        };
        let dsr_out = round_cents(dsr, "dsr")?;
        let ltv_out = round_cents(ltv, "ltv")?;

        let dsr_pass = self.max_dsr.map_or(true, |max| dsr <= max);
        let ltv_pass = self.max_ltv.map_or(true, |max| ltv <= max);
        let income_pass = self.min_income.map_or(true, |min| deal.monthly_income >= min);

        let mut warnings = Vec::new();
        if let Some(max_dsr) = self.max_dsr {
            if dsr > max_dsr * DSR_WARNING_SHARE {
                warnings.push(ComplianceWarning::HighDsr { dsr: dsr_out, max_dsr });
            }
        }
        if ltv > HIGH_LTV_PERCENT {
            warnings.push(ComplianceWarning::HighLtv { ltv: ltv_out });
        }
        if !dsr_pass && !ltv_pass {
            warnings.push(ComplianceWarning::Marginal);
        }

        Ok(ComplianceReport {
            dsr: dsr_out,
            dsr_pass,
            ltv: ltv_out,
            ltv_pass,
            income_pass,
            warnings,
        })
    }
}
