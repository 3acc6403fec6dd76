//! Rule resolution for a deal.
//!
//! [`RuleResolver`] is the single entry point the rest of the desk uses to
//! ask lender questions: which rule applies to an approval, and how long a
//! term a lender will book on a given vehicle. It owns the alias table,
//! the mutable rule store and the (read-only) booking guides.
//!
//! Scoring never talks to the resolver directly. It takes a
//! [`RuleContext`] at the start of a pass and works from that, so rule
//! uploads that land mid-pass are only seen by the next one.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::lenders::booking::{BookingGuides, LenderBookingGuide, TermLimit};
use crate::lenders::rules::{builtin_rules, LenderRuleSet, RuleSnapshot, RuleStore, UploadMode};
use crate::lenders::{AliasTable, LenderKey};
use crate::types::DeskError;

/// Term used for lenders without a booking guide.
pub const DEFAULT_FALLBACK_MAX_TERM: u32 = 84;

/// Immutable view of lender data for one scoring pass.
#[derive(Debug, Clone)]
pub struct RuleContext {
    rules: RuleSnapshot,
    guides: Arc<BookingGuides>,
    aliases: Arc<AliasTable>,
    fallback_max_term: u32,
}

impl RuleContext {
    pub fn key(&self, bank: &str, program: &str) -> LenderKey {
        self.aliases.key(bank, program)
    }

    pub fn find_rule(&self, bank: &str, program: &str) -> Option<&LenderRuleSet> {
        self.rules.find(&self.key(bank, program))
    }

    /// Longest term the lender books on this vehicle. `0` means the
    /// vehicle is ineligible and must be excluded, not financed over zero
    /// months.
    ///
    /// The booking guide sets the limit; a model-year cap on the matching
    /// rule can only tighten it.
    pub fn max_term_for_vehicle(&self, bank: &str, program: &str, year: i32, mileage: f64) -> u32 {
        let key = self.key(bank, program);
        let limit = self
            .guides
            .term_limit(&key.bank, year, mileage, self.fallback_max_term);

        let guide_term = match limit {
            TermLimit::Ineligible => {
                debug!(lender = %key, year, mileage, "Outside every booking-guide range");
                return 0;
            }
            TermLimit::Unlisted => self.fallback_max_term,
            TermLimit::Months(months) => months,
        };

        let term = match self.rules.find(&key).and_then(|r| r.term_cap_for_year(year)) {
            Some(cap) => guide_term.min(cap),
            None => guide_term,
        };
        debug!(lender = %key, year, mileage, guide = %limit, term, "Term resolved");
        term
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Lender rule lookups plus the rule-store upload surface.
#[derive(Debug)]
pub struct RuleResolver {
    store: RuleStore,
    aliases: Arc<AliasTable>,
    guides: Arc<BookingGuides>,
    fallback_max_term: u32,
}

impl RuleResolver {
    pub fn new(aliases: AliasTable, guides: Vec<LenderBookingGuide>, fallback_max_term: u32) -> Self {
        let aliases = Arc::new(aliases);
        let guides = Arc::new(BookingGuides::new(guides, &aliases));
        Self {
            store: RuleStore::new(Arc::clone(&aliases)),
            aliases,
            guides,
            fallback_max_term,
        }
    }

    /// Built-in aliases, programs and booking guides.
    pub fn builtin() -> Result<Self, DeskError> {
        let aliases = Arc::new(AliasTable::builtin()?);
        let guides = Arc::new(BookingGuides::builtin(&aliases)?);
        let resolver = Self {
            store: RuleStore::new(Arc::clone(&aliases)),
            aliases,
            guides,
            fallback_max_term: DEFAULT_FALLBACK_MAX_TERM,
        };
        resolver.set_rules(builtin_rules()?);
        Ok(resolver)
    }

    /// Build from configuration: config aliases on top of the built-in
    /// table, built-in programs when enabled, and the built-in guides
    /// unless a guide file is supplied.
    pub fn from_config(
        config: &AppConfig,
        guides: Option<Vec<LenderBookingGuide>>,
        seed_rules: Vec<LenderRuleSet>,
    ) -> Result<Self, DeskError> {
        let aliases = Arc::new(config.aliases.build()?);
        let guides = match guides {
            Some(list) => BookingGuides::new(list, &aliases),
            None => BookingGuides::builtin(&aliases)?,
        };

        let mut rules = if config.rules.include_builtin { builtin_rules()? } else { Vec::new() };
        rules.extend(seed_rules);

        let resolver = Self {
            store: RuleStore::new(Arc::clone(&aliases)),
            aliases,
            guides: Arc::new(guides),
            fallback_max_term: config.desk.fallback_max_term,
        };
        resolver.set_rules(rules);
        if resolver.guides.is_empty() {
            warn!(
                fallback_max_term = resolver.fallback_max_term,
                "No booking guides loaded, every lender books the fallback term"
            );
        }
        info!(
            rules = resolver.store.snapshot().len(),
            guides = resolver.guides.len(),
            fallback_max_term = resolver.fallback_max_term,
            "Rule resolver ready"
        );
        Ok(resolver)
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn find_rule(&self, bank: &str, program: &str) -> Option<LenderRuleSet> {
        self.store.find_rule(bank, program)
    }

    pub fn max_term_for_vehicle(&self, bank: &str, program: &str, year: i32, mileage: f64) -> u32 {
        self.snapshot().max_term_for_vehicle(bank, program, year, mileage)
    }

    pub fn set_rules(&self, rules: Vec<LenderRuleSet>) -> usize {
        self.store.set_rules(rules)
    }

    pub fn add_rules(&self, rules: Vec<LenderRuleSet>) -> usize {
        self.store.add_rules(rules)
    }

    pub fn apply_upload(&self, rules: Vec<LenderRuleSet>, mode: UploadMode) -> usize {
        self.store.apply(rules, mode)
    }

    pub fn list_rules(&self) -> Vec<LenderRuleSet> {
        self.store.list_rules()
    }

    /// Freeze the current rules and guides for a scoring pass.
    pub fn snapshot(&self) -> RuleContext {
        RuleContext {
            rules: self.store.snapshot(),
            guides: Arc::clone(&self.guides),
            aliases: Arc::clone(&self.aliases),
            fallback_max_term: self.fallback_max_term,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
