//! Inventory scoring pass.
//!
//! One approval, one trade, a whole inventory: score every vehicle, drop
//! the ones the lender will not book, keep going past the ones that fail,
//! and rank what is left by total gross.
//!
//! Ties on total gross keep inventory order. Parallel and sequential
//! passes produce the same ranking.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::comparison::{ApprovalComparison, ApprovalScenario, SkippedApproval};
use super::optimizer::{ExclusionReason, PricingConfig, PricingOptimizer, VehicleOutcome};
use crate::lenders::resolver::{RuleContext, RuleResolver};
use crate::types::{ApprovalSpec, DeskError, ScoredVehicleRow, TradeInfo, Vehicle};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pricing: PricingConfig,
    /// Exclude vehicles not flagged as in stock.
    pub skip_unavailable: bool,
    /// Inventories at least this large are scored across threads.
    pub parallel_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            skip_unavailable: false,
            parallel_threshold: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedVehicle {
    pub vehicle_id: String,
    pub reason: ExclusionReason,
}

/// A vehicle whose scoring failed. The rest of the pass is unaffected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedVehicle {
    pub vehicle_id: String,
    /// Position in the submitted inventory.
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSummary {
    pub vehicles_scanned: usize,
    pub rows_emitted: usize,
    /// Rows whose payment sits inside the approval's band.
    pub compliant_rows: usize,
    pub top_total_gross: Option<Decimal>,
    pub average_monthly_payment: Option<Decimal>,
}

impl ScoringSummary {
    fn from_rows(vehicles_scanned: usize, rows: &[ScoredVehicleRow]) -> Self {
        let average_monthly_payment = if rows.is_empty() {
            None
        } else {
            let total: Decimal = rows.iter().map(|r| r.monthly_payment).sum();
            Some((total / Decimal::from(rows.len())).round_dp(2))
        };
        Self {
            vehicles_scanned,
            rows_emitted: rows.len(),
            compliant_rows: rows.iter().filter(|r| r.is_compliant()).count(),
            top_total_gross: rows.first().map(|r| r.total_gross),
            average_monthly_payment,
        }
    }
}

impl fmt::Display for ScoringSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scanned, {} scored ({} in band)",
            self.vehicles_scanned, self.rows_emitted, self.compliant_rows
        )?;
        if let Some(top) = self.top_total_gross {
            write!(f, ", top gross ${top}")?;
        }
        if let Some(avg) = self.average_monthly_payment {
            write!(f, ", avg ${avg}/mo")?;
        }
        Ok(())
    }
}

/// Everything a scoring pass produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringReport {
    pub pass_id: Uuid,
    pub scored_at: DateTime<Utc>,
    /// Ranked by total gross, best first.
    pub rows: Vec<ScoredVehicleRow>,
    pub excluded: Vec<ExcludedVehicle>,
    pub failed: Vec<FailedVehicle>,
    pub summary: ScoringSummary,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct ScoringPipeline {
    resolver: Arc<RuleResolver>,
    optimizer: PricingOptimizer,
    config: PipelineConfig,
}

impl ScoringPipeline {
    pub fn new(resolver: Arc<RuleResolver>, config: PipelineConfig) -> Self {
        Self {
            resolver,
            optimizer: PricingOptimizer::new(config.pricing.clone()),
            config,
        }
    }

    pub fn resolver(&self) -> &RuleResolver {
        &self.resolver
    }

    /// Ranked rows only.
    pub fn score_inventory(
        &self,
        vehicles: &[Vehicle],
        approval: &ApprovalSpec,
        trade: &TradeInfo,
    ) -> Result<Vec<ScoredVehicleRow>, DeskError> {
        Ok(self.run(vehicles, approval, trade)?.rows)
    }

    /// Score the inventory against one rule snapshot.
    ///
    /// Only an invalid approval fails the whole pass. Per-vehicle errors
    /// land in [`ScoringReport::failed`].
    pub fn run(&self, vehicles: &[Vehicle], approval: &ApprovalSpec, trade: &TradeInfo) -> Result<ScoringReport, DeskError> {
        approval.validate()?;

        let pass_id = Uuid::new_v4();
        let rules = self.resolver.snapshot();
        let parallel = vehicles.len() >= self.config.parallel_threshold;
        info!(
            %pass_id,
            vehicles = vehicles.len(),
            approval = %approval,
            rules = rules.rule_count(),
            parallel,
            "Scoring pass started"
        );

        let outcomes: Vec<Result<VehicleOutcome, DeskError>> = if parallel {
            vehicles
                .par_iter()
                .map(|v| self.score_one(v, approval, trade, &rules))
                .collect()
        } else {
            vehicles
                .iter()
                .map(|v| self.score_one(v, approval, trade, &rules))
                .collect()
        };

        let mut ranked: Vec<(usize, ScoredVehicleRow)> = Vec::new();
        let mut excluded = Vec::new();
        let mut failed = Vec::new();
        for (index, (vehicle, outcome)) in vehicles.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(VehicleOutcome::Scored(row)) => ranked.push((index, row)),
                Ok(VehicleOutcome::Excluded(reason)) => {
                    debug!(%pass_id, vehicle = %vehicle.id, %reason, "Vehicle excluded");
                    excluded.push(ExcludedVehicle {
                        vehicle_id: vehicle.id.clone(),
                        reason,
                    });
                }
                Err(e) => {
                    warn!(%pass_id, vehicle = %vehicle.id, index, error = %e, "Vehicle scoring failed");
                    failed.push(FailedVehicle {
                        vehicle_id: vehicle.id.clone(),
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        ranked.sort_by(|(ia, a), (ib, b)| b.total_gross.cmp(&a.total_gross).then(ia.cmp(ib)));
        let rows: Vec<ScoredVehicleRow> = ranked.into_iter().map(|(_, row)| row).collect();
        let summary = ScoringSummary::from_rows(vehicles.len(), &rows);

        info!(
            %pass_id,
            excluded = excluded.len(),
            failed = failed.len(),
            summary = %summary,
            "Scoring pass complete"
        );

        Ok(ScoringReport {
            pass_id,
            scored_at: Utc::now(),
            rows,
            excluded,
            failed,
            summary,
        })
    }

    /// Score one vehicle under each of a customer's approvals, against a
    /// single rule snapshot, and rank the approvals by total gross.
    ///
    /// An approval that is invalid, excludes the vehicle, or fails to
    /// score is listed as skipped. The others are unaffected.
    pub fn compare_approvals(
        &self,
        vehicle: &Vehicle,
        approvals: &[ApprovalSpec],
        trade: &TradeInfo,
    ) -> ApprovalComparison {
        let rules = self.resolver.snapshot();
        let mut scored = Vec::new();
        let mut skipped = Vec::new();
        for (index, approval) in approvals.iter().enumerate() {
            let outcome = approval
                .validate()
                .and_then(|()| self.score_one(vehicle, approval, trade, &rules));
            match outcome {
                Ok(VehicleOutcome::Scored(row)) => scored.push((index, approval, row)),
                Ok(VehicleOutcome::Excluded(reason)) => {
                    skipped.push(SkippedApproval::new(index, approval, reason.to_string()));
                }
                Err(e) => {
                    warn!(vehicle = %vehicle.id, approval = %approval, error = %e, "Approval could not be scored");
                    skipped.push(SkippedApproval::new(index, approval, e.to_string()));
                }
            }
        }

        let comparison = ApprovalComparison::rank(vehicle.id.clone(), scored, skipped);
        info!(
            vehicle = %vehicle.id,
            approvals = approvals.len(),
            scored = comparison.scenarios.len(),
            best = ?comparison.best().map(|s| s.row.total_gross),
            "Approvals compared"
        );
        comparison
    }

    /// The approval earning the most total gross on `vehicle`, if any
    /// approval can book it.
    pub fn best_approval_for_vehicle(
        &self,
        vehicle: &Vehicle,
        approvals: &[ApprovalSpec],
        trade: &TradeInfo,
    ) -> Option<ApprovalScenario> {
        self.compare_approvals(vehicle, approvals, trade).scenarios.into_iter().next()
    }

    fn score_one(
        &self,
        vehicle: &Vehicle,
        approval: &ApprovalSpec,
        trade: &TradeInfo,
        rules: &RuleContext,
    ) -> Result<VehicleOutcome, DeskError> {
        if self.config.skip_unavailable && !vehicle.in_stock {
            return Ok(VehicleOutcome::Excluded(ExclusionReason::NotInStock));
        }
        self.optimizer.score(vehicle, approval, trade, rules)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
