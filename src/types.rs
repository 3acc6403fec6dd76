//! Shared types for the deal desk.
//!
//! These types form the data model handed across the scoring boundary:
//! inventory, the lender approval and trade figures coming in, scored rows
//! going out. Field names follow the camelCase wire format the surrounding
//! services already speak.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lenders::compliance::ComplianceReport;
use crate::lenders::rules::BackCapRule;
use crate::lenders::AliasError;

// ---------------------------------------------------------------------------
// Vehicle
// ---------------------------------------------------------------------------

/// A vehicle in dealer inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    #[serde(default)]
    pub vin: String,
    pub year: i32,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub trim: Option<String>,
    /// Odometer reading in kilometres.
    #[serde(default)]
    pub mileage: f64,
    /// Acquisition cost. Missing or non-positive means "unknown".
    #[serde(default)]
    pub your_cost: Option<f64>,
    #[serde(default)]
    pub suggested_price: Option<f64>,
    /// Wholesale book valuation the lender advances against.
    #[serde(default, alias = "cbbWholesale")]
    pub black_book_value: Option<f64>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn default_in_stock() -> bool {
    true
}

impl Vehicle {
    /// Display title: "2019 Honda Civic".
    pub fn title(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }

    /// Helper to build a test vehicle with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        Vehicle {
            id: "STK-1001".to_string(),
            vin: "2HGFC2F59KH500001".to_string(),
            year: 2019,
            make: "Honda".to_string(),
            model: "Civic".to_string(),
            trim: Some("LX".to_string()),
            mileage: 80_000.0,
            your_cost: Some(15_000.0),
            suggested_price: Some(21_995.0),
            black_book_value: Some(20_000.0),
            in_stock: true,
            image_url: None,
        }
    }
}

impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({:.0} km)", self.id, self.title(), self.mileage)
    }
}

// ---------------------------------------------------------------------------
// Approval & trade
// ---------------------------------------------------------------------------

/// A lender's financing approval for one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSpec {
    /// Lender name as written on the approval ("TD", "Santander", ...).
    pub bank: String,
    /// Program / tier ("4-Key", "Tier 3", ...).
    pub program: String,
    /// Annual percentage rate, in percent (9.99 = 9.99%).
    pub apr: f64,
    pub term_months: u32,
    #[serde(default)]
    pub payment_min: f64,
    pub payment_max: f64,
    #[serde(default)]
    pub down_payment: f64,
    /// Two-letter province code; the configured default applies when absent.
    #[serde(default)]
    pub province: Option<String>,
    /// Overrides the lender rule's front-end cap factor.
    #[serde(default)]
    pub front_cap_factor: Option<f64>,
    /// Overrides the lender rule's back-end cap.
    #[serde(default)]
    pub back_cap: Option<BackCapRule>,
    /// Status First Nations purchasers are exempt from sales tax.
    #[serde(default)]
    pub is_native_status: bool,
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Customer's gross monthly income. When present, every scored row
    /// carries a DSR/LTV check against the program.
    #[serde(default)]
    pub monthly_income: Option<f64>,
}

impl ApprovalSpec {
    /// Reject approvals that would make every row of a pass meaningless.
    ///
    /// The term is not checked here. A zero term fails per vehicle in the
    /// payment calculator.
    pub fn validate(&self) -> Result<(), DeskError> {
        if !self.apr.is_finite() || self.apr < 0.0 {
            return Err(DeskError::InvalidApproval(format!("APR must be >= 0, got {}", self.apr)));
        }
        if !self.payment_min.is_finite() || !self.payment_max.is_finite() {
            return Err(DeskError::InvalidApproval("payment band must be finite".into()));
        }
        if self.payment_min > self.payment_max {
            return Err(DeskError::InvalidApproval(format!(
                "payment band inverted: min {:.2} > max {:.2}",
                self.payment_min, self.payment_max
            )));
        }
        if !self.down_payment.is_finite() || self.down_payment < 0.0 {
            return Err(DeskError::InvalidApproval(format!(
                "down payment must be >= 0, got {}",
                self.down_payment
            )));
        }
        if let Some(factor) = self.front_cap_factor {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(DeskError::InvalidApproval(format!(
                    "front cap factor must be > 0, got {factor}"
                )));
            }
        }
        if let Some(income) = self.monthly_income {
            if !income.is_finite() || income < 0.0 {
                return Err(DeskError::InvalidApproval(format!(
                    "monthly income must be >= 0, got {income}"
                )));
            }
        }
        Ok(())
    }

    /// Helper to build a test approval with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        ApprovalSpec {
            bank: "Prairie Credit Union".to_string(),
            program: "Standard".to_string(),
            apr: 10.0,
            term_months: 72,
            payment_min: 0.0,
            payment_max: 500.0,
            down_payment: 0.0,
            province: Some("AB".to_string()),
            front_cap_factor: None,
            back_cap: None,
            is_native_status: false,
            customer_name: None,
            monthly_income: None,
        }
    }
}

impl fmt::Display for ApprovalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} @ {:.2}% x {}mo (${:.0}-${:.0})",
            self.bank, self.program, self.apr, self.term_months, self.payment_min, self.payment_max,
        )
    }
}

/// Trade-in figures for the deal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeInfo {
    /// Amount credited to the customer for the trade.
    #[serde(default)]
    pub allowance: f64,
    /// Actual cash value of the trade to the dealer.
    #[serde(default)]
    pub acv: f64,
    /// Outstanding loan balance on the trade.
    #[serde(default)]
    pub lien_balance: f64,
}

impl TradeInfo {
    /// Net trade equity. Negative equity is rolled into the new loan.
    pub fn equity(&self) -> f64 {
        self.allowance - self.lien_balance
    }

    /// Allowance paid beyond the trade's actual cash value.
    pub fn over_allowance(&self) -> f64 {
        (self.allowance - self.acv).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Scored output
// ---------------------------------------------------------------------------

/// Advisory flag attached to a scored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFlag {
    /// Valuation missing; a default black book value was used.
    EstimatedBlackBook,
    /// Cost missing; a default cost was used.
    EstimatedCost,
    /// The chosen payment sits outside the approval's payment band.
    PaymentOutOfRange,
    /// Negative trade equity exceeds what the lender will roll in.
    NegativeEquityExceedsLimit,
    /// The deal breaks the program's DSR, LTV or income limits.
    LenderLimitsExceeded,
}

impl fmt::Display for ScoreFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreFlag::EstimatedBlackBook => write!(f, "estimated_black_book"),
            ScoreFlag::EstimatedCost => write!(f, "estimated_cost"),
            ScoreFlag::PaymentOutOfRange => write!(f, "payment_out_of_range"),
            ScoreFlag::NegativeEquityExceedsLimit => write!(f, "negative_equity_exceeds_limit"),
            ScoreFlag::LenderLimitsExceeded => write!(f, "lender_limits_exceeded"),
        }
    }
}

/// One vehicle's best deal structure under an approval.
///
/// Money is in whole dollars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredVehicleRow {
    pub vehicle_id: String,
    pub vin: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub sale_price: Decimal,
    pub monthly_payment: Decimal,
    /// Effective term after booking-guide and rule limits.
    pub term_months: u32,
    pub amount_financed: Decimal,
    pub front_gross: Decimal,
    pub back_gross: Decimal,
    pub total_gross: Decimal,
    pub flags: Vec<ScoreFlag>,
    /// DSR/LTV check, present when the approval carries the customer's income.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceReport>,
}

impl ScoredVehicleRow {
    pub fn has_flag(&self, flag: ScoreFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Whether the payment landed inside the approval's band.
    pub fn is_compliant(&self) -> bool {
        !self.has_flag(ScoreFlag::PaymentOutOfRange)
    }
}

impl fmt::Display for ScoredVehicleRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} | price ${} | ${}/mo x {} | front ${} back ${} total ${}",
            self.vehicle_id,
            self.title,
            self.sale_price,
            self.monthly_payment,
            self.term_months,
            self.front_gross,
            self.back_gross,
            self.total_gross,
        )?;
        if !self.flags.is_empty() {
            let flags: Vec<String> = self.flags.iter().map(ToString::to_string).collect();
            write!(f, " [{}]", flags.join(", "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the deal desk.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Unknown province: {0}")]
    UnknownProvince(String),

    #[error("Invalid term: {0} months (must be > 0)")]
    InvalidTerm(u32),

    #[error("Invalid principal: {0} (must be >= 0)")]
    InvalidPrincipal(f64),

    #[error("Invalid rate: {0}% (must be >= 0)")]
    InvalidRate(f64),

    #[error("Non-finite value in {field}")]
    NonFinite { field: &'static str },

    #[error("Invalid approval: {0}")]
    InvalidApproval(String),

    #[error("Alias table error: {0}")]
    Alias(#[from] AliasError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
