//! Rule uploads, snapshots and lookups through `RuleResolver`.

use std::sync::Arc;
use std::thread;

use deal_desk::config::AppConfig;
use deal_desk::engine::{PipelineConfig, ScoringPipeline};
use deal_desk::lenders::resolver::RuleResolver;
use deal_desk::lenders::rules::UploadMode;
use deal_desk::storage;
use deal_desk::types::TradeInfo;

use super::{approval, vehicle};

#[test]
fn test_upload_replace_then_append() {
    let resolver = RuleResolver::builtin().unwrap();
    let builtin_count = resolver.list_rules().len();
    assert!(builtin_count > 40);

    let upload = storage::parse_rule_upload(
        r#"[{"bank": "Prairie Credit Union", "program": "Gold", "frontCapFactor": 1.15}]"#,
    )
    .unwrap();
    assert_eq!(resolver.apply_upload(upload.rules, upload.mode), 1);
    assert!(resolver.find_rule("TD", "4-Key").is_none());

    let upload = storage::parse_rule_upload(
        r#"{"mode": "append", "rules": [{"bank": "Prairie Credit Union", "program": "Silver", "maxPayCall": 450}]}"#,
    )
    .unwrap();
    assert_eq!(resolver.apply_upload(upload.rules, upload.mode), 2);
    assert_eq!(
        resolver.find_rule("prairie credit union", "silver").unwrap().max_pay_call,
        Some(450.0)
    );
}

#[test]
fn test_upload_during_pass_does_not_leak_in() {
    let resolver = Arc::new(RuleResolver::builtin().unwrap());
    let snapshot = resolver.snapshot();

    let writer = {
        let resolver = Arc::clone(&resolver);
        thread::spawn(move || {
            resolver.apply_upload(Vec::new(), UploadMode::Replace);
        })
    };
    writer.join().unwrap();

    assert!(snapshot.find_rule("TD", "Key 4").is_some());
    assert!(resolver.find_rule("TD", "Key 4").is_none());
}

#[test]
fn test_rule_change_applies_to_next_pass() {
    let resolver = Arc::new(RuleResolver::new(
        deal_desk::lenders::AliasTable::builtin().unwrap(),
        Vec::new(),
        84,
    ));
    let p = ScoringPipeline::new(Arc::clone(&resolver), PipelineConfig::default());
    let inventory = [vehicle("a", 2019, 60_000.0, Some(15_000.0), Some(20_000.0))];
    let a = approval("Rifco", "Standard");

    let before = p.score_inventory(&inventory, &a, &TradeInfo::default()).unwrap();
    let upload = storage::parse_rule_upload(r#"[{"bank": "RIFCO", "program": "standard", "frontCapFactor": 1.0}]"#)
        .unwrap();
    resolver.apply_upload(upload.rules, upload.mode);
    let after = p.score_inventory(&inventory, &a, &TradeInfo::default()).unwrap();

    assert!(before[0].sale_price > after[0].sale_price);
    assert_eq!(after[0].sale_price, rust_decimal_macros::dec!(20000));
}

#[test]
fn test_eligibility_precheck_with_builtin_guides() {
    let resolver = RuleResolver::builtin().unwrap();
    assert_eq!(resolver.max_term_for_vehicle("LendCare", "Tier 1", 2019, 240_000.0), 78);
    assert_eq!(resolver.max_term_for_vehicle("LendCare", "Tier 1", 2019, 260_000.0), 0);
    assert_eq!(resolver.max_term_for_vehicle("Scotia", "Star 3", 2019, 100_000.0), 78);
    assert_eq!(resolver.max_term_for_vehicle("Unknown Lender", "Any", 2019, 400_000.0), 84);
}

#[test]
fn test_config_driven_resolver() {
    let cfg = AppConfig::parse(
        r#"
        [desk]
        fallback_max_term = 60

        [rules]
        include_builtin = false

        [aliases.banks]
        "rifco auto" = "Rifco"
        "#,
    )
    .unwrap();
    let seed = storage::parse_rule_upload(r#"[{"bank": "Rifco", "program": "Standard", "frontCapFactor": 1.3}]"#)
        .unwrap()
        .rules;
    let resolver = RuleResolver::from_config(&cfg, Some(Vec::new()), seed).unwrap();

    assert_eq!(resolver.list_rules().len(), 1);
    assert!(resolver.find_rule("Rifco Auto", "standard").is_some());
    assert_eq!(resolver.max_term_for_vehicle("Rifco", "Standard", 2019, 50_000.0), 60);
}

#[test]
fn test_config_alias_to_unknown_lender_rejected() {
    let cfg = AppConfig::parse("[aliases.banks]\n\"acme\" = \"Acme Lending\"\n").unwrap();
    assert!(RuleResolver::from_config(&cfg, None, Vec::new()).is_err());
}
