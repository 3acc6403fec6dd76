//! Booking guides: lender → model year → mileage range → max term.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::lenders::AliasTable;
use crate::types::DeskError;

const BUILTIN_GUIDES: &str = include_str!("../../data/booking_guides.json");

/// Mileage band (km, both ends inclusive) and the longest term booked in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MileageRange {
    pub min_km: f64,
    pub max_km: f64,
    pub max_term_months: u32,
}

impl MileageRange {
    pub fn contains(&self, mileage: f64) -> bool {
        mileage >= self.min_km && mileage <= self.max_km
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearBooking {
    pub year: i32,
    /// Scanned in order; the first containing range wins.
    pub ranges: Vec<MileageRange>,
}

/// One lender's booking guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LenderBookingGuide {
    pub lender: String,
    /// Term used for model years the guide does not list.
    #[serde(default)]
    pub default_max_term: Option<u32>,
    #[serde(default)]
    pub bookings: Vec<YearBooking>,
}

/// Outcome of a booking-guide lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermLimit {
    /// The lender has no guide on file.
    Unlisted,
    Months(u32),
    /// Mileage falls outside every range for the model year.
    Ineligible,
}

impl fmt::Display for TermLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermLimit::Unlisted => write!(f, "unlisted"),
            TermLimit::Months(m) => write!(f, "{m}mo"),
            TermLimit::Ineligible => write!(f, "ineligible"),
        }
    }
}

impl LenderBookingGuide {
    /// Term limit for a vehicle. `fallback` covers model years the guide
    /// omits when it has no default of its own.
    pub fn term_limit(&self, year: i32, mileage: f64, fallback: u32) -> TermLimit {
        let Some(booking) = self.bookings.iter().find(|b| b.year == year) else {
            return TermLimit::Months(self.default_max_term.unwrap_or(fallback));
        };
        booking
            .ranges
            .iter()
            .find(|r| r.contains(mileage))
            .map_or(TermLimit::Ineligible, |r| TermLimit::Months(r.max_term_months))
    }
}

/// All booking guides, keyed by canonical lender name.
#[derive(Debug, Clone, Default)]
pub struct BookingGuides {
    by_lender: HashMap<String, LenderBookingGuide>,
}

impl BookingGuides {
    /// Index guides by canonical lender. When a lender appears twice, the
    /// first guide is kept.
    pub fn new(guides: Vec<LenderBookingGuide>, aliases: &AliasTable) -> Self {
        let mut by_lender = HashMap::with_capacity(guides.len());
        for guide in guides {
            let key = aliases.canonical_bank(&guide.lender);
            if by_lender.contains_key(&key) {
                debug!(lender = %guide.lender, "Duplicate booking guide ignored");
                continue;
            }
            by_lender.insert(key, guide);
        }
        Self { by_lender }
    }

    /// Guides bundled with the binary.
    pub fn builtin(aliases: &AliasTable) -> Result<Self, DeskError> {
        let guides: Vec<LenderBookingGuide> = serde_json::from_str(BUILTIN_GUIDES)
            .map_err(|e| DeskError::Storage(format!("built-in booking guides are malformed: {e}")))?;
        Ok(Self::new(guides, aliases))
    }

    pub fn get(&self, canonical_bank: &str) -> Option<&LenderBookingGuide> {
        self.by_lender.get(canonical_bank)
    }

    pub fn term_limit(&self, canonical_bank: &str, year: i32, mileage: f64, fallback: u32) -> TermLimit {
        self.get(canonical_bank)
            .map_or(TermLimit::Unlisted, |g| g.term_limit(year, mileage, fallback))
    }

    pub fn len(&self) -> usize {
        self.by_lender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lender.is_empty()
    }
}
