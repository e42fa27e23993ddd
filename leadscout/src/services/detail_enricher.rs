//! Place detail enrichment
//!
//! Turns a `PlaceSummary` into a `Candidate` with address, phone, canonical
//! URL and a coordinate. Missing text fields become `N/A`; a missing
//! coordinate makes the candidate unusable.

use super::api::{PlacesApi, ServiceError};
use crate::models::candidate::MISSING_FIELD;
use crate::models::{Candidate, PlaceSummary};
use std::sync::Arc;
use thiserror::Error;

/// Enrichment failure, classified by what it means for the candidate
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EnrichError {
    /// Place no longer exists; retrying cannot help
    #[error("Place not found: {0}")]
    NotFound(String),

    /// Place lacks data needed downstream
    #[error("Invalid candidate: {0}")]
    Invalid(String),

    /// Network, timeout or service-side failure; retry next run
    #[error("Transient enrichment failure: {0}")]
    Transient(ServiceError),
}

impl EnrichError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EnrichError::Transient(_))
    }
}

impl From<ServiceError> for EnrichError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::NotFound(id) => EnrichError::NotFound(id),
            other => EnrichError::Transient(other),
        }
    }
}

pub struct DetailEnricher {
    places: Arc<dyn PlacesApi>,
}

impl DetailEnricher {
    pub fn new(places: Arc<dyn PlacesApi>) -> Self {
        Self { places }
    }

    pub async fn enrich(&self, summary: &PlaceSummary, region: &str) -> Result<Candidate, EnrichError> {
        let details = self.places.place_details(&summary.place_id).await?;

        let location = details
            .location
            .or(summary.location)
            .ok_or_else(|| EnrichError::Invalid(format!("{} has no location", summary.place_id)))?;

        let text = |value: Option<String>| value.unwrap_or_else(|| MISSING_FIELD.to_string());

        Ok(Candidate {
            place_id: summary.place_id.clone(),
            name: text(details.name.or_else(|| summary.name.clone())),
            address: text(details.formatted_address),
            phone: text(details.formatted_phone_number),
            location,
            maps_url: text(details.url),
            region: region.to_string(),
        })
    }
}
