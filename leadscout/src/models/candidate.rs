//! Candidate business locations

use leadscout_common::Coordinate;
use serde::{Deserialize, Serialize};

/// Placeholder for detail fields the places service did not return
pub const MISSING_FIELD: &str = "N/A";

/// Raw enumerator output: identifier plus minimal fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub place_id: String,
    pub name: Option<String>,
    pub location: Option<Coordinate>,
}

impl PlaceSummary {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(MISSING_FIELD)
    }
}

/// A summary tagged with the region whose search found it first
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPlace {
    pub summary: PlaceSummary,
    pub region: String,
}

/// Enriched candidate, read-only for the rest of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub location: Coordinate,
    /// Canonical reference URL for the place
    pub maps_url: String,
    /// Source region name
    pub region: String,
}
