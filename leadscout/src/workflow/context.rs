//! Shared per-run pipeline context
//!
//! Holds the pipeline components, the run-scoped circuit breaker and the
//! settings. Built once per run and shared behind an `Arc`.

use crate::config::{PipelineSettings, ScoutConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::services::{
    CandidateEnumerator, CircuitBreaker, DetailEnricher, GooglePlacesClient, ImageryAcquirer,
    MoondreamClient, PlacesApi, StreetViewApi, StreetViewClient, VisionApi, VisionClassifier,
};
use std::sync::Arc;

pub struct PipelineContext {
    pub enumerator: CandidateEnumerator,
    pub enricher: DetailEnricher,
    pub acquirer: ImageryAcquirer,
    pub classifier: VisionClassifier,
    pub breaker: Arc<CircuitBreaker>,
    pub settings: PipelineSettings,
}

impl PipelineContext {
    /// Wire components over the given service implementations
    pub fn new(
        places: Arc<dyn PlacesApi>,
        streetview: Arc<dyn StreetViewApi>,
        vision: Arc<dyn VisionApi>,
        settings: PipelineSettings,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new());

        let enumerator = CandidateEnumerator::new(
            Arc::clone(&places),
            settings.radius_meters,
            settings.page_delay,
            settings.enumeration_workers,
        );
        let enricher = DetailEnricher::new(Arc::clone(&places));
        let acquirer = ImageryAcquirer::new(streetview, places, settings.imagery.clone());
        let classifier = VisionClassifier::new(
            vision,
            settings.vision.prompt.clone(),
            settings.vision.affirmative_token.clone(),
            Arc::clone(&breaker),
        );

        Self {
            enumerator,
            enricher,
            acquirer,
            classifier,
            breaker,
            settings,
        }
    }

    /// Wire components over the production HTTP clients
    pub fn from_config(config: &ScoutConfig) -> PipelineResult<Self> {
        let clients = &config.clients;

        let places = GooglePlacesClient::new(
            config.maps_api_key.clone(),
            clients.places_timeout,
            clients.places_rate_per_sec,
        )
        .map_err(|e| PipelineError::ExternalServiceUnavailable(format!("places client: {}", e)))?;

        let streetview = StreetViewClient::new(
            config.maps_api_key.clone(),
            clients.streetview_metadata_timeout,
            clients.streetview_image_timeout,
            clients.streetview_rate_per_sec,
        )
        .map_err(|e| PipelineError::ExternalServiceUnavailable(format!("street view client: {}", e)))?;

        let vision = MoondreamClient::new(
            config.vision_endpoint.clone(),
            clients.vision_timeout,
            clients.vision_rate_per_sec,
        )
            .map_err(|e| PipelineError::ExternalServiceUnavailable(format!("vision client: {}", e)))?;

        tracing::info!(
            endpoint = %vision.endpoint(),
            rate_per_sec = ?clients.vision_rate_per_sec,
            "Vision client initialized"
        );

        Ok(Self::new(
            Arc::new(places),
            Arc::new(streetview),
            Arc::new(vision),
            config.settings.clone(),
        ))
    }
}
