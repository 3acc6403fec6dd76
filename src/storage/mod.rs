//! File I/O for rule uploads, booking guides and scoring inputs.
//!
//! Everything on disk is camelCase JSON. Rule files come in two shapes:
//! a bare array of rule sets, or an upload envelope
//! `{ "rules": [...], "mode": "replace" | "append" }`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::lenders::booking::LenderBookingGuide;
use crate::lenders::rules::{LenderRuleSet, UploadMode};
use crate::types::{ApprovalSpec, TradeInfo, Vehicle};

/// A parsed rule upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleUpload {
    pub rules: Vec<LenderRuleSet>,
    #[serde(default)]
    pub mode: UploadMode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Bare(Vec<LenderRuleSet>),
    Envelope(RuleUpload),
}

/// One deal: the approval plus an optional trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealFile {
    pub approval: ApprovalSpec,
    #[serde(default)]
    pub trade: TradeInfo,
}

/// Several approvals for one customer, compared on one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalsFile {
    pub approvals: Vec<ApprovalSpec>,
    #[serde(default)]
    pub trade: TradeInfo,
}

/// Parse a rule upload body. A bare array is a replace.
pub fn parse_rule_upload(json: &str) -> Result<RuleUpload> {
    let file: RuleFile = serde_json::from_str(json).context("Rule upload is neither a rule array nor an upload envelope")?;
    Ok(match file {
        RuleFile::Bare(rules) => RuleUpload {
            rules,
            mode: UploadMode::Replace,
        },
        RuleFile::Envelope(upload) => upload,
    })
}

fn read(path: &str) -> Result<String> {
    std::fs::read_to_string(path).context(format!("Failed to read {path}"))
}

/// Load a rule file in either shape.
pub fn load_rules(path: &str) -> Result<RuleUpload> {
    let upload = parse_rule_upload(&read(path)?).context(format!("Failed to parse rules from {path}"))?;
    info!(path, rules = upload.rules.len(), mode = ?upload.mode, "Rules loaded");
    Ok(upload)
}

/// Write rules as a bare, pretty-printed array.
pub fn save_rules(rules: &[LenderRuleSet], path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(rules).context("Failed to serialise rules")?;
    std::fs::write(path, &json).context(format!("Failed to write rules to {path}"))?;
    debug!(path, rules = rules.len(), "Rules saved");
    Ok(())
}

/// Load a booking guide file (array of lender guides).
pub fn load_booking_guides(path: &str) -> Result<Vec<LenderBookingGuide>> {
    let guides: Vec<LenderBookingGuide> =
        serde_json::from_str(&read(path)?).context(format!("Failed to parse booking guides from {path}"))?;
    info!(path, lenders = guides.len(), "Booking guides loaded");
    Ok(guides)
}

pub fn load_inventory(path: &str) -> Result<Vec<Vehicle>> {
    let vehicles: Vec<Vehicle> =
        serde_json::from_str(&read(path)?).context(format!("Failed to parse inventory from {path}"))?;
    info!(path, vehicles = vehicles.len(), "Inventory loaded");
    Ok(vehicles)
}

pub fn load_deal(path: &str) -> Result<DealFile> {
    serde_json::from_str(&read(path)?).context(format!("Failed to parse deal from {path}"))
}

pub fn load_approvals(path: &str) -> Result<ApprovalsFile> {
    let file: ApprovalsFile =
        serde_json::from_str(&read(path)?).context(format!("Failed to parse approvals from {path}"))?;
    info!(path, approvals = file.approvals.len(), "Approvals loaded");
    Ok(file)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
