//! Full scoring passes through `ScoringPipeline`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use deal_desk::engine::optimizer::{DealTerms, PricingConfig, PricingOptimizer, SearchBounds};
use deal_desk::engine::{ExclusionReason, PipelineConfig, ScoringPipeline};
use deal_desk::lenders::booking::{LenderBookingGuide, MileageRange, YearBooking};
use deal_desk::lenders::resolver::RuleResolver;
use deal_desk::lenders::rules::LenderRuleSet;
use deal_desk::lenders::AliasTable;
use deal_desk::types::{ScoreFlag, TradeInfo};

use super::{approval, vehicle};

fn credit_union_guide() -> LenderBookingGuide {
    LenderBookingGuide {
        lender: "Prairie Credit Union".into(),
        default_max_term: Some(72),
        bookings: vec![YearBooking {
            year: 2019,
            ranges: vec![
                MileageRange { min_km: 0.0, max_km: 120_000.0, max_term_months: 84 },
                MileageRange { min_km: 120_001.0, max_km: 200_000.0, max_term_months: 72 },
            ],
        }],
    }
}

fn capped_rule(factor: f64) -> LenderRuleSet {
    LenderRuleSet {
        bank: "Prairie Credit Union".into(),
        program: "Standard".into(),
        front_cap_factor: Some(factor),
        back_cap: None,
        reserve: None,
        max_pay_call: None,
        term_by_model_year: Vec::new(),
        negative_equity_limit: None,
        max_dsr: None,
        min_income: None,
    }
}

fn pipeline(rules: Vec<LenderRuleSet>, guides: Vec<LenderBookingGuide>, config: PipelineConfig) -> ScoringPipeline {
    let resolver = RuleResolver::new(AliasTable::builtin().unwrap(), guides, 84);
    resolver.set_rules(rules);
    ScoringPipeline::new(Arc::new(resolver), config)
}

fn mixed_inventory(n: usize) -> Vec<deal_desk::types::Vehicle> {
    (0..n)
        .map(|i| {
            let cost = match i % 4 {
                0 => None,
                _ => Some(8_000.0 + (i % 13) as f64 * 1_500.0),
            };
            let bb = if i % 7 == 0 { None } else { Some(12_000.0 + (i % 11) as f64 * 2_000.0) };
            let mileage = 20_000.0 + (i % 9) as f64 * 25_000.0;
            vehicle(&format!("v{i:03}"), 2019, mileage, cost, bb)
        })
        .collect()
}

#[test]
fn test_unconstrained_scenario() {
    let p = pipeline(Vec::new(), Vec::new(), PipelineConfig::default());
    let v = vehicle("s1", 2019, 80_000.0, Some(15_000.0), Some(20_000.0));
    let rows = p
        .score_inventory(&[v], &approval("Prairie Credit Union", "Standard"), &TradeInfo::default())
        .unwrap();

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert!(row.monthly_payment <= dec!(500));
    assert!(row.monthly_payment >= dec!(499));
    assert!(row.sale_price > dec!(24900) && row.sale_price < dec!(24960), "price {}", row.sale_price);
    assert_eq!(row.front_gross, row.sale_price - dec!(15000));
    assert_eq!(row.back_gross, Decimal::ZERO);
    assert_eq!(row.total_gross, row.front_gross);
}

#[test]
fn test_front_cap_scenario() {
    let p = pipeline(vec![capped_rule(1.2)], Vec::new(), PipelineConfig::default());
    let v = vehicle("s2", 2019, 80_000.0, Some(15_000.0), Some(20_000.0));
    let rows = p
        .score_inventory(&[v], &approval("prairie credit-union", "STANDARD"), &TradeInfo::default())
        .unwrap();
    assert_eq!(rows[0].sale_price, dec!(24000));
    assert_eq!(rows[0].front_gross, dec!(9000));
    assert!(rows[0].flags.is_empty());
}

#[test]
fn test_high_mileage_excluded() {
    let p = pipeline(Vec::new(), vec![credit_union_guide()], PipelineConfig::default());
    let inventory = vec![
        vehicle("worn", 2019, 210_000.0, Some(15_000.0), Some(20_000.0)),
        vehicle("fine", 2019, 150_000.0, Some(15_000.0), Some(20_000.0)),
    ];
    let report = p
        .run(&inventory, &approval("Prairie Credit Union", "Standard"), &TradeInfo::default())
        .unwrap();

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].vehicle_id, "fine");
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].vehicle_id, "worn");
    assert_eq!(report.excluded[0].reason, ExclusionReason::VehicleIneligibleYearMileage);
    assert!(report.failed.is_empty());
}

#[test]
fn test_builtin_td_program() {
    let resolver = RuleResolver::builtin().unwrap();
    let p = ScoringPipeline::new(Arc::new(resolver), PipelineConfig::default());
    let v = vehicle("td", 2019, 80_000.0, Some(15_000.0), Some(20_000.0));
    let rows = p
        .score_inventory(&[v], &approval("TD", "Key 4"), &TradeInfo::default())
        .unwrap();

    let row = &rows[0];
    assert_eq!(row.term_months, 72);
    // amount financed lands in the 25,000 to 40,000 reserve band
    assert!(row.amount_financed >= dec!(25000) && row.amount_financed < dec!(40000));
    assert_eq!(row.back_gross, dec!(600));
    assert_eq!(row.total_gross, row.front_gross + dec!(600));
}

#[test]
fn test_td_reserve_just_under_band_edge() {
    let resolver = RuleResolver::builtin().unwrap();
    let p = ScoringPipeline::new(Arc::new(resolver), PipelineConfig::default());
    let v = vehicle("edge", 2019, 80_000.0, Some(15_000.0), Some(20_000.0));
    // price 23,038.095 puts the principal a fraction of a cent under 25,000
    let mut a = approval("TD", "Key 4");
    a.front_cap_factor = Some(1.15190475);
    let rows = p.score_inventory(&[v], &a, &TradeInfo::default()).unwrap();

    let row = &rows[0];
    assert_eq!(row.sale_price, dec!(23038));
    assert_eq!(row.amount_financed, dec!(25000));
    assert_eq!(row.back_gross, dec!(500));
}

#[test]
fn test_payment_monotone_in_price() {
    let trade = TradeInfo { allowance: 4_000.0, acv: 3_500.0, lien_balance: 6_000.0 };
    let terms = DealTerms {
        apr: 14.99,
        term_months: 84,
        down_payment: 1_000.0,
        province: "ON",
        tax_exempt: false,
        trade: &trade,
        dealer_fee: 810.0,
    };
    let mut last = f64::MIN;
    for step in 0..200 {
        let price = step as f64 * 250.0;
        let pay = terms.monthly_payment_at(price).unwrap();
        assert!(pay >= last, "payment fell at {price}");
        last = pay;
    }
}

#[test]
fn test_search_is_maximal() {
    let trade = TradeInfo::default();
    let terms = DealTerms {
        apr: 8.5,
        term_months: 60,
        down_payment: 0.0,
        province: "BC",
        tax_exempt: false,
        trade: &trade,
        dealer_fee: 810.0,
    };
    let optimizer = PricingOptimizer::new(PricingConfig::default());
    let bounds = SearchBounds::new(12_000.0, f64::INFINITY, 100_000.0);
    let cap = 450.0;
    let best = optimizer.search(bounds, cap, |p| terms.monthly_payment_at(p)).unwrap();

    assert!(best.within_cap);
    assert!(best.price >= bounds.min_price);
    assert!(terms.monthly_payment_at(best.price).unwrap() <= cap);
    assert!(terms.monthly_payment_at(best.price + 0.02).unwrap() > cap);
}

#[test]
fn test_floor_behaviour() {
    let p = pipeline(Vec::new(), Vec::new(), PipelineConfig::default());
    let mut a = approval("Prairie Credit Union", "Standard");
    a.payment_max = 300.0;
    let v = vehicle("dear", 2019, 80_000.0, Some(30_000.0), Some(20_000.0));
    let rows = p.score_inventory(&[v], &a, &TradeInfo::default()).unwrap();
    assert_eq!(rows[0].sale_price, dec!(30000));
    assert!(rows[0].has_flag(ScoreFlag::PaymentOutOfRange));
}

#[test]
fn test_default_flags_and_invariants_over_mixed_inventory() {
    let p = pipeline(vec![capped_rule(1.3)], vec![credit_union_guide()], PipelineConfig::default());
    let inventory = mixed_inventory(40);
    let report = p
        .run(&inventory, &approval("Prairie Credit Union", "Standard"), &TradeInfo::default())
        .unwrap();

    assert_eq!(report.rows.len() + report.excluded.len() + report.failed.len(), inventory.len());
    for row in &report.rows {
        let v = inventory.iter().find(|v| v.id == row.vehicle_id).unwrap();
        assert_eq!(row.has_flag(ScoreFlag::EstimatedCost), v.your_cost.is_none());
        assert_eq!(row.has_flag(ScoreFlag::EstimatedBlackBook), v.black_book_value.is_none());
        assert!(row.total_gross >= Decimal::ZERO);
    }
    for pair in report.rows.windows(2) {
        assert!(pair[0].total_gross >= pair[1].total_gross);
    }
    // 220,000 km vehicles fall outside the guide
    assert!(report.excluded.iter().all(|e| e.reason == ExclusionReason::VehicleIneligibleYearMileage));
    assert!(!report.excluded.is_empty());
}

#[test]
fn test_parallel_matches_sequential() {
    let inventory = mixed_inventory(150);
    let a = approval("Prairie Credit Union", "Standard");
    let trade = TradeInfo { allowance: 2_000.0, acv: 1_500.0, lien_balance: 3_000.0 };

    let sequential = pipeline(
        vec![capped_rule(1.25)],
        vec![credit_union_guide()],
        PipelineConfig { parallel_threshold: usize::MAX, ..PipelineConfig::default() },
    )
    .score_inventory(&inventory, &a, &trade)
    .unwrap();
    let parallel = pipeline(
        vec![capped_rule(1.25)],
        vec![credit_union_guide()],
        PipelineConfig { parallel_threshold: 1, ..PipelineConfig::default() },
    )
    .score_inventory(&inventory, &a, &trade)
    .unwrap();

    let key = |rows: &[deal_desk::types::ScoredVehicleRow]| -> Vec<(String, Decimal)> {
        rows.iter().map(|r| (r.vehicle_id.clone(), r.total_gross)).collect()
    };
    assert_eq!(key(&sequential), key(&parallel));
}

#[test]
fn test_equal_gross_keeps_input_order() {
    let p = pipeline(vec![capped_rule(1.2)], Vec::new(), PipelineConfig::default());
    let inventory: Vec<_> = ["c", "a", "b"]
        .iter()
        .map(|id| vehicle(id, 2019, 50_000.0, Some(15_000.0), Some(20_000.0)))
        .collect();
    let rows = p
        .score_inventory(&inventory, &approval("Prairie Credit Union", "Standard"), &TradeInfo::default())
        .unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.vehicle_id.as_str()).collect();
    assert_eq!(ids, ["c", "a", "b"]);
}

#[test]
fn test_report_serializes() {
    let p = pipeline(Vec::new(), Vec::new(), PipelineConfig::default());
    let report = p
        .run(
            &[vehicle("j", 2020, 30_000.0, None, None)],
            &approval("Prairie Credit Union", "Standard"),
            &TradeInfo::default(),
        )
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["passId"].is_string());
    assert_eq!(json["rows"][0]["vehicleId"], "j");
    let flags = json["rows"][0]["flags"].as_array().unwrap();
    assert!(flags.contains(&serde_json::json!("estimated_cost")));
    assert!(flags.contains(&serde_json::json!("estimated_black_book")));
}
