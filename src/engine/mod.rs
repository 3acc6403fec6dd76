//! Core engine: per-vehicle price optimisation, the inventory scoring pass
//! and approval comparison.

pub mod comparison;
pub mod optimizer;
pub mod pipeline;

pub use comparison::{rank_by_advance, ApprovalComparison, ApprovalScenario, Recommendation};
pub use optimizer::{ExclusionReason, PricingConfig, PricingOptimizer, VehicleOutcome};
pub use pipeline::{PipelineConfig, ScoringPipeline, ScoringReport, ScoringSummary};
