//! Trade-in equity.
//!
//! Positive equity is a credit on the deal. Negative equity is rolled into
//! the new loan, but only up to what the lender allows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::finance::round_cents;
use crate::types::{DeskError, TradeInfo};

/// Equity position of a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradeEquity {
    Positive {
        amount: Decimal,
    },
    Negative {
        /// Shortfall, as a positive number.
        amount: Decimal,
        can_roll: bool,
        limit: Option<Decimal>,
    },
}

impl TradeEquity {
    /// Negative equity the lender will not roll in.
    pub fn exceeds_limit(&self) -> bool {
        matches!(self, TradeEquity::Negative { can_roll: false, .. })
    }
}

/// Classify a trade against an optional negative-equity rollover limit.
/// Without a limit, any shortfall can be rolled.
pub fn assess_equity(trade: &TradeInfo, negative_equity_limit: Option<f64>) -> Result<TradeEquity, DeskError> {
    let equity = trade.equity();
    if !equity.is_finite() {
        return Err(DeskError::NonFinite { field: "trade_equity" });
    }
    if equity >= 0.0 {
        return Ok(TradeEquity::Positive {
            amount: round_cents(equity, "trade_equity")?,
        });
    }

    let shortfall = -equity;
    let can_roll = negative_equity_limit.map_or(true, |limit| shortfall <= limit);
    Ok(TradeEquity::Negative {
        amount: round_cents(shortfall, "trade_equity")?,
        can_roll,
        limit: negative_equity_limit
            .map(|l| round_cents(l, "negative_equity_limit"))
            .transpose()?,
    })
}
