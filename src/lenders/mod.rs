//! Lender naming, rules and booking guides.
//!
//! Approvals, uploaded rule files and booking guides all spell lenders
//! and programs differently ("TD", "td auto", "TD Auto Finance"; "4-Key",
//! "Key 4"). Every lookup goes through [`AliasTable`] so that all three
//! sources meet on the same canonical key.

pub mod booking;
pub mod compliance;
pub mod resolver;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Canonical names
// ---------------------------------------------------------------------------

/// Lenders the desk knows by name.
pub const CANONICAL_BANKS: &[&str] = &[
    "td auto finance",
    "santander consumer",
    "scotia dealer advantage",
    "autocapital",
    "eden park",
    "ia auto finance",
    "lendcare",
    "northlake",
    "rifco",
    "prefera",
];

/// Built-in bank aliases (alias → canonical).
const BANK_ALIASES: &[(&str, &str)] = &[
    ("td", "td auto finance"),
    ("td auto", "td auto finance"),
    ("td bank", "td auto finance"),
    ("tdaf", "td auto finance"),
    ("santander", "santander consumer"),
    ("sda", "scotia dealer advantage"),
    ("scotia", "scotia dealer advantage"),
    ("scotiabank", "scotia dealer advantage"),
    ("auto capital", "autocapital"),
    ("autocapital canada", "autocapital"),
    ("edenpark", "eden park"),
    ("ia", "ia auto finance"),
    ("ia auto", "ia auto finance"),
    ("iaautofinance", "ia auto finance"),
    ("lend care", "lendcare"),
    ("northlake financial", "northlake"),
    ("rifco national auto finance", "rifco"),
    ("prefera finance", "prefera"),
];

/// Words that form "<word> <number>" program tiers.
const ORDINAL_WORDS: &[&str] = &["key", "star", "tier", "ride"];

/// Lower-case, turn punctuation into spaces, split letter/digit runs and
/// collapse whitespace: `"TD-Auto  4Key"` → `"td auto 4 key"`.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev: Option<char> = None;

    for ch in raw.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if let Some(p) = prev {
                if p != ' ' && p.is_ascii_digit() != ch.is_ascii_digit() {
                    out.push(' ');
                }
            }
            out.push(ch);
            prev = Some(ch);
        } else if prev.is_some_and(|p| p != ' ') {
            out.push(' ');
            prev = Some(' ');
        }
    }

    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Put "<number> <word>" tiers into "<word> <number>" order.
fn program_shape(normalized: &str) -> String {
    let tokens: Vec<&str> = normalized.split(' ').collect();
    if let [a, b] = tokens.as_slice() {
        let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        let (word, number) = if is_number(a) { (*b, *a) } else { (*a, *b) };
        if ORDINAL_WORDS.contains(&word) && is_number(number) {
            let trimmed = number.trim_start_matches('0');
            let number = if trimmed.is_empty() { "0" } else { trimmed };
            return format!("{word} {number}");
        }
    }
    normalized.to_string()
}

/// Canonical (bank, program) pair used to key rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LenderKey {
    pub bank: String,
    pub program: String,
}

impl fmt::Display for LenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.bank, self.program)
    }
}

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

/// Alias table construction errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AliasError {
    #[error("alias '{alias}' points at unknown canonical lender '{target}'")]
    UnknownCanonical { alias: String, target: String },

    #[error("alias '{alias}' maps to both '{first}' and '{second}'")]
    ConflictingAlias { alias: String, first: String, second: String },

    #[error("alias '{0}' is empty after normalisation")]
    Empty(String),
}

/// Maps lender and program spellings to canonical names.
///
/// Validated as it is built. An alias must point at a known lender and
/// may not be claimed by two.
#[derive(Debug, Clone)]
pub struct AliasTable {
    banks: HashMap<String, String>,
    programs: HashMap<String, String>,
}

impl AliasTable {
    /// The built-in lender aliases.
    pub fn builtin() -> Result<Self, AliasError> {
        let mut table = Self {
            banks: HashMap::new(),
            programs: HashMap::new(),
        };
        for canonical in CANONICAL_BANKS {
            table.insert_bank(canonical, canonical)?;
        }
        for (alias, canonical) in BANK_ALIASES {
            table.insert_bank(alias, canonical)?;
        }
        Ok(table)
    }

    /// Add a bank alias. The target must be one of [`CANONICAL_BANKS`].
    pub fn with_bank_alias(mut self, alias: &str, canonical: &str) -> Result<Self, AliasError> {
        self.insert_bank(alias, canonical)?;
        Ok(self)
    }

    /// Add a program alias, e.g. `"platinum plus"` → `"platinum"`.
    pub fn with_program_alias(mut self, alias: &str, canonical: &str) -> Result<Self, AliasError> {
        let key = program_shape(&normalize_name(alias));
        let target = program_shape(&normalize_name(canonical));
        if key.is_empty() {
            return Err(AliasError::Empty(alias.to_string()));
        }
        if target.is_empty() {
            return Err(AliasError::Empty(canonical.to_string()));
        }
        insert_unique(&mut self.programs, key, target)?;
        Ok(self)
    }

    fn insert_bank(&mut self, alias: &str, canonical: &str) -> Result<(), AliasError> {
        let key = normalize_name(alias);
        if key.is_empty() {
            return Err(AliasError::Empty(alias.to_string()));
        }
        let target = normalize_name(canonical);
        if !CANONICAL_BANKS.contains(&target.as_str()) {
            return Err(AliasError::UnknownCanonical {
                alias: alias.to_string(),
                target: canonical.to_string(),
            });
        }
        insert_unique(&mut self.banks, key, target)
    }

    /// Canonical bank name. Unlisted lenders keep their normalised name.
    pub fn canonical_bank(&self, raw: &str) -> String {
        let normalized = normalize_name(raw);
        self.banks.get(&normalized).cloned().unwrap_or(normalized)
    }

    /// Canonical program name.
    pub fn canonical_program(&self, raw: &str) -> String {
        let shaped = program_shape(&normalize_name(raw));
        self.programs.get(&shaped).cloned().unwrap_or(shaped)
    }

    pub fn key(&self, bank: &str, program: &str) -> LenderKey {
        LenderKey {
            bank: self.canonical_bank(bank),
            program: self.canonical_program(program),
        }
    }

    /// Whether `raw` resolves to one of the known lenders.
    pub fn is_known_bank(&self, raw: &str) -> bool {
        self.banks.contains_key(&normalize_name(raw))
    }
}

fn insert_unique(map: &mut HashMap<String, String>, key: String, target: String) -> Result<(), AliasError> {
    match map.get(&key) {
        Some(existing) if *existing != target => Err(AliasError::ConflictingAlias {
            alias: key,
            first: existing.clone(),
            second: target,
        }),
        Some(_) => Ok(()),
        None => {
            map.insert(key, target);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
