//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a missing section (or an empty file) yields the
//! stock desk settings.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;

use crate::engine::optimizer::PricingConfig;
use crate::engine::pipeline::PipelineConfig;
use crate::lenders::{AliasError, AliasTable};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub desk: DeskConfig,
    pub rules: RulesConfig,
    pub aliases: AliasConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeskConfig {
    /// Province applied when an approval does not name one.
    pub default_province: String,
    /// Fixed fee added to every amount financed.
    pub dealer_fee: f64,
    /// Valuation assumed when a vehicle has none.
    pub default_black_book: f64,
    /// Cost assumed when a vehicle has none.
    pub default_cost: f64,
    /// Width of the price search above the floor when nothing caps it.
    pub search_window: f64,
    /// Price search stops once the bracket is narrower than this.
    pub price_tolerance: f64,
    /// Term for lenders with no booking guide.
    pub fallback_max_term: u32,
    /// Leave out vehicles flagged as not in stock.
    pub skip_unavailable: bool,
    /// Inventories at least this large are scored in parallel.
    pub parallel_threshold: usize,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            default_province: "AB".to_string(),
            dealer_fee: 810.0,
            default_black_book: 40_000.0,
            default_cost: 10_000.0,
            search_window: 100_000.0,
            price_tolerance: 0.01,
            fallback_max_term: 84,
            skip_unavailable: false,
            parallel_threshold: 64,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RulesConfig {
    /// Load the built-in lender programs before any seed file.
    pub include_builtin: bool,
    /// JSON rule file appended after the built-in programs.
    pub seed_file: Option<String>,
    /// JSON booking guide file replacing the built-in guides.
    pub booking_guide_file: Option<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            include_builtin: true,
            seed_file: None,
            booking_guide_file: None,
        }
    }
}

/// Extra alias → canonical mappings layered on the built-in table.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AliasConfig {
    pub banks: BTreeMap<String, String>,
    pub programs: BTreeMap<String, String>,
}

impl AliasConfig {
    /// Built-in aliases plus the configured ones. Fails on the first alias
    /// that targets an unknown lender or conflicts with an existing one.
    pub fn build(&self) -> Result<AliasTable, AliasError> {
        let mut table = AliasTable::builtin()?;
        for (alias, canonical) in &self.banks {
            table = table.with_bank_alias(alias, canonical)?;
        }
        for (alias, canonical) in &self.programs {
            table = table.with_program_alias(alias, canonical)?;
        }
        Ok(table)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn pricing(&self) -> PricingConfig {
        PricingConfig {
            dealer_fee: self.desk.dealer_fee,
            default_black_book: self.desk.default_black_book,
            default_cost: self.desk.default_cost,
            default_province: self.desk.default_province.clone(),
            search_window: self.desk.search_window,
            price_tolerance: self.desk.price_tolerance,
            ..PricingConfig::default()
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            pricing: self.pricing(),
            skip_unavailable: self.desk.skip_unavailable,
            parallel_threshold: self.desk.parallel_threshold,
        }
    }
}
