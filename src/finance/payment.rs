//! Loan payment calculation.
//!
//! Standard amortizing-loan formula:
//!
//!   M = P × r(1+r)^n / ((1+r)^n − 1),  r = APR / 100 / 12
//!
//! with the zero-rate case falling back to straight division.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::finance::round_cents;
use crate::types::DeskError;

fn check_inputs(principal: f64, apr_percent: f64, term_months: u32) -> Result<(), DeskError> {
    if !principal.is_finite() {
        return Err(DeskError::NonFinite { field: "principal" });
    }
    if principal < 0.0 {
        return Err(DeskError::InvalidPrincipal(principal));
    }
    if !apr_percent.is_finite() || apr_percent < 0.0 {
        return Err(DeskError::InvalidRate(apr_percent));
    }
    if term_months == 0 {
        return Err(DeskError::InvalidTerm(term_months));
    }
    Ok(())
}

/// Monthly payment on `principal` at `apr_percent` over `term_months`.
///
/// Callers clamp negative principal to zero before calling.
pub fn monthly_payment(principal: f64, apr_percent: f64, term_months: u32) -> Result<f64, DeskError> {
    check_inputs(principal, apr_percent, term_months)?;

    let r = apr_percent / 100.0 / 12.0;
    let n = term_months as f64;
    if r == 0.0 {
        return Ok(principal / n);
    }

    let growth = (1.0 + r).powf(n);
    Ok(principal * r * growth / (growth - 1.0))
}

/// Largest principal a `payment` services at `apr_percent` over
/// `term_months`, rounded down to whole dollars. Inverse of
/// [`monthly_payment`].
pub fn max_advance(payment: f64, apr_percent: f64, term_months: u32) -> Result<f64, DeskError> {
    if !payment.is_finite() {
        return Err(DeskError::NonFinite { field: "payment" });
    }
    check_inputs(0.0, apr_percent, term_months)?;

    let payment = payment.max(0.0);
    let r = apr_percent / 100.0 / 12.0;
    let n = term_months as f64;
    let principal = if r == 0.0 {
        payment * n
    } else {
        payment * (1.0 - (1.0 + r).powf(-n)) / r
    };
    Ok(principal.floor())
}

// ---------------------------------------------------------------------------
// Summary & schedule
// ---------------------------------------------------------------------------

/// Payment totals for a loan, in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub monthly_payment: Decimal,
    pub term_months: u32,
    pub total_of_payments: Decimal,
    pub total_interest: Decimal,
}

/// One month of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationEntry {
    pub month: u32,
    pub payment: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    pub balance: Decimal,
}

/// Monthly payment plus what the loan costs over its life.
pub fn payment_summary(principal: f64, apr_percent: f64, term_months: u32) -> Result<PaymentSummary, DeskError> {
    let payment = monthly_payment(principal, apr_percent, term_months)?;
    let total = payment * term_months as f64;
    Ok(PaymentSummary {
        monthly_payment: round_cents(payment, "monthly_payment")?,
        term_months,
        total_of_payments: round_cents(total, "total_of_payments")?,
        total_interest: round_cents(total - principal, "total_interest")?,
    })
}

/// Month-by-month split of each payment into interest and principal.
///
/// The final month retires whatever balance remains, so the schedule always
/// ends at zero.
pub fn amortization_schedule(
    principal: f64,
    apr_percent: f64,
    term_months: u32,
) -> Result<Vec<AmortizationEntry>, DeskError> {
    let payment = monthly_payment(principal, apr_percent, term_months)?;
    let r = apr_percent / 100.0 / 12.0;

    let mut schedule = Vec::with_capacity(term_months as usize);
    let mut balance = principal;
    for month in 1..=term_months {
        let interest = balance * r;
        let (paid, principal_part) = if month == term_months {
            (balance + interest, balance)
        } else {
            (payment, payment - interest)
        };
        balance = if month == term_months { 0.0 } else { balance - principal_part };

        schedule.push(AmortizationEntry {
            month,
            payment: round_cents(paid, "payment")?,
            principal: round_cents(principal_part, "principal")?,
            interest: round_cents(interest, "interest")?,
            balance: round_cents(balance, "balance")?,
        });
    }
    Ok(schedule)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
