//! Comparing several approvals for the same customer.
//!
//! Customers often come in holding more than one approval. Once a vehicle
//! is picked, each approval is scored on it and ranked by total gross.
//! Before that, approvals can be ranked by how much principal their
//! payment ceiling will carry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::finance::{payment, round_dollars};
use crate::types::{ApprovalSpec, DeskError, ScoredVehicleRow};

/// How the desk should treat an approval, by rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    HighestProfit,
    GoodAlternative,
    LastResort,
}

impl Recommendation {
    /// First place is the pick and last place the fallback. A lone
    /// approval is the pick.
    fn for_position(position: usize, len: usize) -> Self {
        if position == 0 {
            Recommendation::HighestProfit
        } else if position + 1 >= len {
            Recommendation::LastResort
        } else {
            Recommendation::GoodAlternative
        }
    }
}

/// One approval scored on the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalScenario {
    /// Position in the submitted approval list.
    pub approval_index: usize,
    pub bank: String,
    pub program: String,
    /// 1-based.
    pub rank: usize,
    pub recommendation: Recommendation,
    /// Total gross given up by booking this approval instead of the best.
    pub gross_shortfall: Decimal,
    pub row: ScoredVehicleRow,
}

/// An approval that produced no row for the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedApproval {
    pub approval_index: usize,
    pub bank: String,
    pub program: String,
    pub reason: String,
}

impl SkippedApproval {
    pub fn new(approval_index: usize, approval: &ApprovalSpec, reason: impl Into<String>) -> Self {
        Self {
            approval_index,
            bank: approval.bank.clone(),
            program: approval.program.clone(),
            reason: reason.into(),
        }
    }
}

/// Every approval's outcome on one vehicle, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalComparison {
    pub vehicle_id: String,
    pub scenarios: Vec<ApprovalScenario>,
    pub skipped: Vec<SkippedApproval>,
}

impl ApprovalComparison {
    /// Rank scored approvals by total gross. Equal gross keeps submission
    /// order.
    pub fn rank(
        vehicle_id: String,
        mut scored: Vec<(usize, &ApprovalSpec, ScoredVehicleRow)>,
        skipped: Vec<SkippedApproval>,
    ) -> Self {
        scored.sort_by(|(ia, _, a), (ib, _, b)| b.total_gross.cmp(&a.total_gross).then(ia.cmp(ib)));

        let best = scored.first().map_or(Decimal::ZERO, |(_, _, row)| row.total_gross);
        let len = scored.len();
        let scenarios = scored
            .into_iter()
            .enumerate()
            .map(|(position, (approval_index, approval, row))| {
                ApprovalScenario {
                    approval_index,
                    bank: approval.bank.clone(),
                    program: approval.program.clone(),
                    rank: position + 1,
                    recommendation: Recommendation::for_position(position, len),
                    gross_shortfall: (best - row.total_gross).max(Decimal::ZERO),
                    row,
                }
            })
            .collect();

        Self { vehicle_id, scenarios, skipped }
    }

    pub fn best(&self) -> Option<&ApprovalScenario> {
        self.scenarios.first()
    }
}

/// An approval ranked by the principal its payment ceiling carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRanking {
    pub approval_index: usize,
    pub bank: String,
    pub program: String,
    /// Principal `paymentMax` services at the approval's APR and term.
    pub max_advance: Decimal,
    pub rank: usize,
    pub recommendation: Recommendation,
}

/// Rank approvals by maximum advance, highest first. A lower rate or a
/// longer term carries more principal for the same payment.
pub fn rank_by_advance(approvals: &[ApprovalSpec]) -> Result<Vec<AdvanceRanking>, DeskError> {
    let mut advances = approvals
        .iter()
        .enumerate()
        .map(|(index, a)| Ok((index, a, payment::max_advance(a.payment_max, a.apr, a.term_months)?)))
        .collect::<Result<Vec<_>, DeskError>>()?;
    advances.sort_by(|(ia, _, a), (ib, _, b)| b.total_cmp(a).then(ia.cmp(ib)));

    let len = advances.len();
    advances
        .into_iter()
        .enumerate()
        .map(|(position, (index, approval, advance))| {
            Ok(AdvanceRanking {
                approval_index: index,
                bank: approval.bank.clone(),
                program: approval.program.clone(),
                max_advance: round_dollars(advance, "max_advance")?,
                rank: position + 1,
                recommendation: Recommendation::for_position(position, len),
            })
        })
        .collect()
}
