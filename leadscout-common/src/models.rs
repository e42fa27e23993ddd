//! Durable record models
//!
//! `Lead` is the on-disk record shared between the discovery pipeline and the
//! review surface. Field aliases accept datasets written by earlier tooling
//! (`city`, `Maps_url`, `image_filepaths`).

use crate::geo::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default review status for a freshly materialized lead
pub const DEFAULT_LEAD_STATUS: &str = "New";

/// Region label used when a record carries no region
pub const UNKNOWN_REGION: &str = "Unknown City";

/// Named search area with a center coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Overrides the global search radius for this region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_meters: Option<u32>,
}

impl Region {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
            radius_meters: None,
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// A positively classified business, persisted for human review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(alias = "Maps_url")]
    pub maps_url: String,
    #[serde(alias = "city", default = "unknown_region")]
    pub region: String,
    /// Saved image paths, relative to the data root
    #[serde(alias = "image_filepaths", default)]
    pub image_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,

    // Review fields, mutated only by the review surface
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub follow_up: bool,
}

fn default_status() -> String {
    DEFAULT_LEAD_STATUS.to_string()
}

fn unknown_region() -> String {
    UNKNOWN_REGION.to_string()
}

/// Single-field mutation issued by the review surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum LeadUpdate {
    Status(String),
    Notes(String),
    FollowUp(bool),
}

impl LeadUpdate {
    pub fn apply(&self, lead: &mut Lead) {
        match self {
            LeadUpdate::Status(status) => lead.status = status.clone(),
            LeadUpdate::Notes(notes) => lead.notes = notes.clone(),
            LeadUpdate::FollowUp(flag) => lead.follow_up = *flag,
        }
    }
}

/// Group leads by their own region field, regions in first-appearance order
///
/// Lead order within a region is file order, so `(region, index)` addresses
/// stay stable between reads while nothing appends concurrently.
pub fn group_by_region(leads: &[Lead]) -> Vec<(String, Vec<Lead>)> {
    let mut groups: Vec<(String, Vec<Lead>)> = Vec::new();
    for lead in leads {
        match groups.iter_mut().find(|(region, _)| *region == lead.region) {
            Some((_, members)) => members.push(lead.clone()),
            None => groups.push((lead.region.clone(), vec![lead.clone()])),
        }
    }
    groups
}

/// Position in the full list of the `index`-th lead within `region`
pub fn position_in_region(leads: &[Lead], region: &str, index: usize) -> Option<usize> {
    leads
        .iter()
        .enumerate()
        .filter(|(_, lead)| lead.region == region)
        .nth(index)
        .map(|(position, _)| position)
}
