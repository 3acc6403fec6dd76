//! Lender rule sets and the in-memory rule store.
//!
//! Rules arrive from three places: the built-in program table compiled
//! into the binary, an optional seed file, and runtime uploads that either
//! replace the store or append to it. Lookup returns the first rule whose
//! canonical key matches, in insertion order.
//!
//! The store hands out immutable snapshots. A scoring pass holds one
//! snapshot from start to finish, so an upload landing mid-pass only
//! affects later passes.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::lenders::{AliasTable, LenderKey};
use crate::types::DeskError;

/// Programs shipped with the binary.
const BUILTIN_RULES: &str = include_str!("../../data/default_rules.json");

// ---------------------------------------------------------------------------
// Rule types
// ---------------------------------------------------------------------------

/// What a back-end cap is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackCapKind {
    PercentOfBb,
    PercentOfPrice,
}

/// Ceiling on lender reserve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackCapRule {
    #[serde(rename = "type")]
    pub kind: BackCapKind,
    /// Fraction, e.g. 0.2 for 20%.
    pub percent: f64,
}

impl BackCapRule {
    pub fn cap_amount(&self, black_book: f64, sale_price: f64) -> f64 {
        match self.kind {
            BackCapKind::PercentOfBb => self.percent * black_book,
            BackCapKind::PercentOfPrice => self.percent * sale_price,
        }
    }
}

/// Fixed amount paid when the amount financed falls inside a band.
///
/// Bands are half-open: `minFinanced` is inclusive, `maxFinanced` is
/// exclusive, so adjacent bands share an edge with no gap between them.
/// A band without `maxFinanced` has no upper bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveBracket {
    pub min_financed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_financed: Option<f64>,
    pub amount: f64,
}

impl ReserveBracket {
    pub fn contains(&self, financed: f64) -> bool {
        financed >= self.min_financed && self.max_financed.map_or(true, |max| financed < max)
    }
}

/// How a lender pays the dealer for booking the loan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRule {
    /// Fraction of amount financed, e.g. 0.02.
    #[serde(default)]
    pub percent_of_financed: Option<f64>,
    #[serde(default)]
    pub fixed_by_financed_amount: Vec<ReserveBracket>,
    #[serde(default)]
    pub quality_bonus_by_financed_amount: Vec<ReserveBracket>,
    /// Chargeback window in days, informational.
    #[serde(default)]
    pub chargeback_days: Option<u32>,
}

impl ReserveRule {
    /// Percentage reserve plus the first matching fixed bracket plus the
    /// first matching quality bonus.
    pub fn reserve_for(&self, financed: f64) -> f64 {
        let percent = self.percent_of_financed.map_or(0.0, |p| p * financed);
        let first_match = |brackets: &[ReserveBracket]| {
            brackets
                .iter()
                .find(|b| b.contains(financed))
                .map_or(0.0, |b| b.amount)
        };
        percent
            + first_match(&self.fixed_by_financed_amount)
            + first_match(&self.quality_bonus_by_financed_amount)
    }
}

/// Term ceiling for a band of model years (inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermByModelYear {
    pub year_from: i32,
    pub year_to: i32,
    pub max_term_months: u32,
}

/// Everything the desk knows about one lender program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LenderRuleSet {
    pub bank: String,
    pub program: String,
    /// Multiplier on black book bounding the sale price. Absent = uncapped.
    #[serde(default)]
    pub front_cap_factor: Option<f64>,
    #[serde(default)]
    pub back_cap: Option<BackCapRule>,
    #[serde(default)]
    pub reserve: Option<ReserveRule>,
    /// Lender's ceiling on monthly payment.
    #[serde(default)]
    pub max_pay_call: Option<f64>,
    #[serde(default)]
    pub term_by_model_year: Vec<TermByModelYear>,
    /// Most negative trade equity the lender will roll into the loan.
    #[serde(default)]
    pub negative_equity_limit: Option<f64>,
    /// Debt service ratio ceiling, in percent of monthly income.
    #[serde(default)]
    pub max_dsr: Option<f64>,
    /// Minimum monthly income the program accepts.
    #[serde(default)]
    pub min_income: Option<f64>,
}

impl LenderRuleSet {
    /// Tightest model-year term cap covering `year`, if any.
    pub fn term_cap_for_year(&self, year: i32) -> Option<u32> {
        self.term_by_model_year
            .iter()
            .filter(|t| year >= t.year_from && year <= t.year_to)
            .map(|t| t.max_term_months)
            .min()
    }
}

/// Programs compiled into the binary.
pub fn builtin_rules() -> Result<Vec<LenderRuleSet>, DeskError> {
    serde_json::from_str(BUILTIN_RULES)
        .map_err(|e| DeskError::Storage(format!("built-in rule table is malformed: {e}")))
}

// ---------------------------------------------------------------------------
// Rule store
// ---------------------------------------------------------------------------

/// How an upload combines with the rules already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    #[default]
    Replace,
    Append,
}

#[derive(Debug, Clone)]
struct StoredRule {
    key: LenderKey,
    rule: LenderRuleSet,
}

/// Read-only view of the store taken at one instant.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    entries: Arc<Vec<StoredRule>>,
}

impl RuleSnapshot {
    /// First rule stored under `key`.
    pub fn find(&self, key: &LenderKey) -> Option<&LenderRuleSet> {
        self.entries.iter().find(|e| e.key == *key).map(|e| &e.rule)
    }

    pub fn rules(&self) -> impl Iterator<Item = &LenderRuleSet> {
        self.entries.iter().map(|e| &e.rule)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replace/append rule collection with copy-on-write snapshots.
#[derive(Debug)]
pub struct RuleStore {
    aliases: Arc<AliasTable>,
    entries: RwLock<Arc<Vec<StoredRule>>>,
}

impl RuleStore {
    pub fn new(aliases: Arc<AliasTable>) -> Self {
        Self {
            aliases,
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    fn keyed(&self, rules: Vec<LenderRuleSet>) -> Vec<StoredRule> {
        rules
            .into_iter()
            .map(|rule| StoredRule {
                key: self.aliases.key(&rule.bank, &rule.program),
                rule,
            })
            .collect()
    }

    /// Replace the whole store. Returns the new rule count.
    pub fn set_rules(&self, rules: Vec<LenderRuleSet>) -> usize {
        let entries = self.keyed(rules);
        let total = entries.len();
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(entries);
        info!(total, "Rule store replaced");
        total
    }

    /// Append to the store. Rules already stored under the same key keep
    /// winning lookups. Returns the new rule count.
    pub fn add_rules(&self, rules: Vec<LenderRuleSet>) -> usize {
        let incoming = self.keyed(rules);
        let added = incoming.len();
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut guard).extend(incoming);
        let total = guard.len();
        info!(added, total, "Rules appended");
        total
    }

    pub fn apply(&self, rules: Vec<LenderRuleSet>, mode: UploadMode) -> usize {
        match mode {
            UploadMode::Replace => self.set_rules(rules),
            UploadMode::Append => self.add_rules(rules),
        }
    }

    /// Copy of every stored rule, in insertion order.
    pub fn list_rules(&self) -> Vec<LenderRuleSet> {
        self.snapshot().rules().cloned().collect()
    }

    pub fn snapshot(&self) -> RuleSnapshot {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        RuleSnapshot {
            entries: Arc::clone(&guard),
        }
    }

    /// First rule for (bank, program) after alias resolution.
    pub fn find_rule(&self, bank: &str, program: &str) -> Option<LenderRuleSet> {
        let key = self.aliases.key(bank, program);
        let found = self.snapshot().find(&key).cloned();
        if found.is_none() {
            debug!(key = %key, "No lender rule on file");
        }
        found
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
