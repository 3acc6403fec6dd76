//! Payment-constrained price optimisation for a single vehicle.
//!
//! For one vehicle under one approval, find the highest sale price whose
//! monthly payment still fits the approval, then work out what the deal
//! earns the dealer up front (front gross) and from the lender (reserve,
//! a.k.a. back gross).
//!
//! Payment is monotone non-decreasing in sale price once APR, term, trade
//! and tax are fixed, so the search is a plain bisection between the
//! vehicle's cost and the lender's front-end cap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::finance::trade::assess_equity;
use crate::finance::{payment, round_dollars, tax};
use crate::lenders::compliance::{ComplianceLimits, DealFigures};
use crate::lenders::resolver::RuleContext;
use crate::lenders::rules::LenderRuleSet;
use crate::types::{ApprovalSpec, DeskError, ScoreFlag, ScoredVehicleRow, TradeInfo, Vehicle};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Pricing constants.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Fixed dealer fee added to every amount financed.
    pub dealer_fee: f64,
    /// Valuation substituted when a vehicle has none.
    pub default_black_book: f64,
    /// Cost substituted when a vehicle has none.
    pub default_cost: f64,
    /// Province used when the approval names none.
    pub default_province: String,
    /// Search ceiling above cost when nothing tighter applies.
    pub search_window: f64,
    /// Bisection stops when the bracket is narrower than this.
    pub price_tolerance: f64,
    /// Hard stop on bisection steps.
    pub max_iterations: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            dealer_fee: 810.0,
            default_black_book: 40_000.0,
            default_cost: 10_000.0,
            default_province: "AB".to_string(),
            search_window: 100_000.0,
            price_tolerance: 0.01,
            max_iterations: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a vehicle was left out of the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Mileage is outside every booking-guide range for the model year.
    VehicleIneligibleYearMileage,
    NotInStock,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::VehicleIneligibleYearMileage => write!(f, "vehicle_ineligible_year_mileage"),
            ExclusionReason::NotInStock => write!(f, "not_in_stock"),
        }
    }
}

/// Result of scoring one vehicle.
#[derive(Debug, Clone)]
pub enum VehicleOutcome {
    Scored(ScoredVehicleRow),
    Excluded(ExclusionReason),
}

/// Price interval the search runs over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBounds {
    pub min_price: f64,
    pub max_price: f64,
}

impl SearchBounds {
    /// `[cost, min(front cap, cost + window)]`, never inverted.
    pub fn new(cost: f64, front_cap: f64, window: f64) -> Self {
        let min_price = cost.max(0.0);
        let max_price = min_price.max(front_cap.min(min_price + window));
        Self { min_price, max_price }
    }
}

/// Best price found by the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSearch {
    pub price: f64,
    pub payment: f64,
    /// The payment is at or under the ceiling.
    pub within_cap: bool,
}

/// Inputs to the payment function that do not depend on the vehicle.
#[derive(Debug, Clone)]
pub struct DealTerms<'a> {
    pub apr: f64,
    pub term_months: u32,
    pub down_payment: f64,
    pub province: &'a str,
    pub tax_exempt: bool,
    pub trade: &'a TradeInfo,
    pub dealer_fee: f64,
}

impl DealTerms<'_> {
    /// Principal at `sale_price`: price less down payment and trade equity,
    /// plus the dealer fee and sales tax, clamped at zero. Negative equity
    /// raises the principal.
    pub fn amount_financed(&self, sale_price: f64) -> Result<f64, DeskError> {
        let tax = tax::compute(sale_price, self.trade.allowance, self.province, self.tax_exempt)?;
        let total_tax = decimal_to_f64(tax.total_tax, "total_tax")?;
        let principal = sale_price - self.down_payment - self.trade.equity() + self.dealer_fee + total_tax;
        if principal.is_nan() {
            return Err(DeskError::NonFinite { field: "principal" });
        }
        Ok(principal.max(0.0))
    }

    pub fn monthly_payment_at(&self, sale_price: f64) -> Result<f64, DeskError> {
        payment::monthly_payment(self.amount_financed(sale_price)?, self.apr, self.term_months)
    }
}

fn decimal_to_f64(value: Decimal, field: &'static str) -> Result<f64, DeskError> {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().ok_or(DeskError::NonFinite { field })
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

pub struct PricingOptimizer {
    config: PricingConfig,
}

impl PricingOptimizer {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Highest price in `bounds` whose payment is at or under `payment_cap`.
    ///
    /// The floor is returned (with `within_cap == false`) when even the
    /// cheapest price overshoots. Otherwise the bracket `[lo, hi]` is
    /// narrowed with `lo` always affordable and `hi` never affordable.
    pub fn search<F>(&self, bounds: SearchBounds, payment_cap: f64, payment_at: F) -> Result<PriceSearch, DeskError>
    where
        F: Fn(f64) -> Result<f64, DeskError>,
    {
        let floor_payment = payment_at(bounds.min_price)?;
        if floor_payment > payment_cap {
            return Ok(PriceSearch {
                price: bounds.min_price,
                payment: floor_payment,
                within_cap: false,
            });
        }

        let ceiling_payment = payment_at(bounds.max_price)?;
        if ceiling_payment <= payment_cap {
            return Ok(PriceSearch {
                price: bounds.max_price,
                payment: ceiling_payment,
                within_cap: true,
            });
        }

        let (mut lo, mut lo_payment) = (bounds.min_price, floor_payment);
        let mut hi = bounds.max_price;
        let mut iterations = 0;
        while hi - lo > self.config.price_tolerance && iterations < self.config.max_iterations {
            let mid = lo + (hi - lo) / 2.0;
            let pay = payment_at(mid)?;
            if pay <= payment_cap {
                lo = mid;
                lo_payment = pay;
            } else {
                hi = mid;
            }
            iterations += 1;
        }

        Ok(PriceSearch {
            price: lo,
            payment: lo_payment,
            within_cap: true,
        })
    }

    /// Score one vehicle under an approval.
    ///
    /// Missing valuation or cost is defaulted and flagged. A vehicle the
    /// lender's booking guide will not finance is excluded. Anything else
    /// that goes wrong is returned as an error for the caller to isolate.
    pub fn score(
        &self,
        vehicle: &Vehicle,
        approval: &ApprovalSpec,
        trade: &TradeInfo,
        rules: &RuleContext,
    ) -> Result<VehicleOutcome, DeskError> {
        if !vehicle.mileage.is_finite() {
            return Err(DeskError::NonFinite { field: "mileage" });
        }

        let mut flags = Vec::new();

        // 1. Defaults
        let black_book = match vehicle.black_book_value {
            Some(bb) if bb.is_finite() && bb > 0.0 => bb,
            _ => {
                flags.push(ScoreFlag::EstimatedBlackBook);
                self.config.default_black_book
            }
        };
        let cost = match vehicle.your_cost {
            Some(c) if c.is_finite() && c > 0.0 => c,
            _ => {
                flags.push(ScoreFlag::EstimatedCost);
                self.config.default_cost
            }
        };

        // 2. Rule and term
        let rule = rules.find_rule(&approval.bank, &approval.program);
        let max_term = rules.max_term_for_vehicle(&approval.bank, &approval.program, vehicle.year, vehicle.mileage);
        if max_term == 0 {
            debug!(vehicle = %vehicle.id, year = vehicle.year, mileage = vehicle.mileage, "Excluded by booking guide");
            return Ok(VehicleOutcome::Excluded(ExclusionReason::VehicleIneligibleYearMileage));
        }

        // 3. Effective constraints
        let term_months = approval.term_months.min(max_term);
        let payment_cap = approval
            .payment_max
            .min(rule.and_then(|r| r.max_pay_call).unwrap_or(f64::INFINITY));
        let front_cap = approval
            .front_cap_factor
            .or(rule.and_then(|r| r.front_cap_factor))
            .map_or(f64::INFINITY, |factor| factor * black_book);

        if let Some(limit) = rule.and_then(|r| r.negative_equity_limit) {
            if assess_equity(trade, Some(limit))?.exceeds_limit() {
                flags.push(ScoreFlag::NegativeEquityExceedsLimit);
            }
        }

        // 4-5. Search
        let terms = DealTerms {
            apr: approval.apr,
            term_months,
            down_payment: approval.down_payment,
            province: approval
                .province
                .as_deref()
                .unwrap_or(&self.config.default_province),
            tax_exempt: approval.is_native_status,
            trade,
            dealer_fee: self.config.dealer_fee,
        };
        let bounds = SearchBounds::new(cost, front_cap, self.config.search_window);
        let best = self.search(bounds, payment_cap, |price| terms.monthly_payment_at(price))?;

        if !best.within_cap || best.payment < approval.payment_min {
            flags.push(ScoreFlag::PaymentOutOfRange);
        }

        // 6-8. Principal and gross
        let principal = terms.amount_financed(best.price)?;
        let front = (best.price - cost) - trade.over_allowance();
        let back = self.back_gross(rule, approval, principal, black_book, best.price);

        // Lender limits, when the customer's income is known
        let compliance = match approval.monthly_income {
            Some(income) => {
                let report = ComplianceLimits::for_deal(rule, approval.front_cap_factor).check(&DealFigures {
                    monthly_payment: best.payment,
                    monthly_income: income,
                    amount_financed: principal,
                    black_book,
                })?;
                if !report.passes() {
                    flags.push(ScoreFlag::LenderLimitsExceeded);
                }
                Some(report)
            }
            None => None,
        };

        // 9. Totals
        let front_gross = round_dollars(front, "front_gross")?;
        let back_gross = round_dollars(back, "back_gross")?;
        let total_gross = round_dollars(front + back, "total_gross")?.max(Decimal::ZERO);

        debug!(
            vehicle = %vehicle.id,
            price = %format!("${:.2}", best.price),
            payment = %format!("${:.2}", best.payment),
            term_months,
            total_gross = %total_gross,
            "Vehicle scored"
        );

        Ok(VehicleOutcome::Scored(ScoredVehicleRow {
            vehicle_id: vehicle.id.clone(),
            vin: vehicle.vin.clone(),
            title: vehicle.title(),
            image_url: vehicle.image_url.clone(),
            sale_price: round_dollars(best.price, "sale_price")?,
            monthly_payment: round_dollars(best.payment, "monthly_payment")?,
            term_months,
            amount_financed: round_dollars(principal, "amount_financed")?,
            front_gross,
            back_gross,
            total_gross,
            flags,
            compliance,
        }))
    }

    /// Reserve on `principal`, limited by the back-end cap. The approval's
    /// cap overrides the rule's.
    fn back_gross(
        &self,
        rule: Option<&LenderRuleSet>,
        approval: &ApprovalSpec,
        principal: f64,
        black_book: f64,
        sale_price: f64,
    ) -> f64 {
        let mut reserve = rule
            .and_then(|r| r.reserve.as_ref())
            .map_or(0.0, |r| r.reserve_for(principal));

        if let Some(cap) = approval.back_cap.or(rule.and_then(|r| r.back_cap)) {
            reserve = reserve.min(cap.cap_amount(black_book, sale_price));
        }
        reserve.max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
