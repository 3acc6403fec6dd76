//! Several approvals for one customer, scored on the same vehicle.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use deal_desk::engine::{rank_by_advance, PipelineConfig, Recommendation, ScoringPipeline};
use deal_desk::lenders::resolver::RuleResolver;
use deal_desk::types::{ApprovalSpec, ScoreFlag, TradeInfo};

use super::{approval, vehicle};

fn builtin_pipeline() -> ScoringPipeline {
    ScoringPipeline::new(Arc::new(RuleResolver::builtin().unwrap()), PipelineConfig::default())
}

fn with_income(mut a: ApprovalSpec, income: f64) -> ApprovalSpec {
    a.monthly_income = Some(income);
    a
}

#[test]
fn test_td_outranks_santander_on_reserve() {
    let p = builtin_pipeline();
    let v = vehicle("c1", 2019, 80_000.0, Some(15_000.0), Some(20_000.0));
    let approvals = vec![
        with_income(approval("Santander", "Tier 3"), 2_000.0),
        with_income(approval("TD", "Key 4"), 2_000.0),
    ];
    let c = p.compare_approvals(&v, &approvals, &TradeInfo::default());

    assert!(c.skipped.is_empty());
    assert_eq!(c.scenarios.len(), 2);
    let best = c.best().unwrap();
    assert_eq!(best.approval_index, 1);
    assert_eq!(best.recommendation, Recommendation::HighestProfit);
    assert_eq!(best.gross_shortfall, Decimal::ZERO);
    // same price and term, 600 reserve against a flat 525
    let runner_up = &c.scenarios[1];
    assert_eq!(runner_up.row.sale_price, best.row.sale_price);
    assert_eq!(runner_up.gross_shortfall, dec!(75));
    assert_eq!(runner_up.recommendation, Recommendation::LastResort);
}

#[test]
fn test_lender_limits_follow_each_program() {
    let p = builtin_pipeline();
    let v = vehicle("c2", 2019, 80_000.0, Some(15_000.0), Some(20_000.0));
    let approvals = vec![
        with_income(approval("TD", "Key 4"), 2_000.0),
        with_income(approval("Santander", "Tier 3"), 2_000.0),
    ];
    let c = p.compare_approvals(&v, &approvals, &TradeInfo::default());

    let td = c.scenarios.iter().find(|s| s.approval_index == 0).unwrap();
    let td_check = td.row.compliance.as_ref().unwrap();
    assert!(td_check.passes());
    assert!(td_check.dsr <= dec!(25));
    assert!(td_check.ltv > dec!(130) && td_check.ltv <= dec!(140), "ltv {}", td_check.ltv);
    assert!(!td.row.has_flag(ScoreFlag::LenderLimitsExceeded));

    // the program wants 2,500 a month
    let santander = c.scenarios.iter().find(|s| s.approval_index == 1).unwrap();
    let santander_check = santander.row.compliance.as_ref().unwrap();
    assert!(santander_check.dsr_pass);
    assert!(!santander_check.income_pass);
    assert!(santander.row.has_flag(ScoreFlag::LenderLimitsExceeded));
}

#[test]
fn test_best_approval_matches_comparison() {
    let p = builtin_pipeline();
    let v = vehicle("c3", 2019, 80_000.0, Some(15_000.0), Some(20_000.0));
    let mut bad = approval("TD", "Key 4");
    bad.payment_min = 900.0;
    let approvals = vec![bad, approval("Santander", "Tier 3"), approval("TD", "Key 4")];

    let c = p.compare_approvals(&v, &approvals, &TradeInfo::default());
    assert_eq!(c.skipped.len(), 1);
    assert_eq!(c.skipped[0].approval_index, 0);

    let best = p.best_approval_for_vehicle(&v, &approvals, &TradeInfo::default()).unwrap();
    assert_eq!(best.approval_index, c.best().unwrap().approval_index);
    assert_eq!(best.row.total_gross, c.best().unwrap().row.total_gross);
    assert!(best.row.compliance.is_none());
}

#[test]
fn test_advance_ranking_prefers_longer_term() {
    let mut short = approval("TD", "Key 4");
    short.term_months = 48;
    let approvals = vec![short, approval("Santander", "Tier 3")];
    let ranked = rank_by_advance(&approvals).unwrap();

    assert_eq!(ranked[0].approval_index, 1);
    assert_eq!(ranked[0].rank, 1);
    assert!(ranked[0].max_advance > ranked[1].max_advance);
    // 500 a month at 10% over 72 months
    assert!(ranked[0].max_advance > dec!(26900) && ranked[0].max_advance < dec!(27100));
}
