//! Storefront imagery acquisition
//!
//! **Strategy:**
//! 1. Find the nearest outdoor panorama to the candidate
//! 2. Aim at the candidate: bearing from panorama to storefront, bracketed by
//!    the configured offsets
//! 3. Keep responses larger than the placeholder threshold
//! 4. With no usable oriented image, fall back to the place's own photos
//!
//! One failed heading never aborts the others. Failures are logged and
//! folded into `Acquisition::transient_failure`.

use super::api::{PlacesApi, StreetViewApi, StreetViewRequest};
use crate::models::{Candidate, ImageSample};
use futures::future::join_all;
use leadscout_common::config::ImageryConfig;
use leadscout_common::geo::{heading_degrees, initial_bearing, offset_bearing};
use leadscout_common::Coordinate;
use std::sync::Arc;

/// Images gathered for one candidate
#[derive(Debug, Clone, Default)]
pub struct Acquisition {
    pub samples: Vec<ImageSample>,
    /// At least one request failed at network level. Set even when other
    /// requests produced samples; without a positive the candidate must be
    /// retried next run
    pub transient_failure: bool,
}

pub struct ImageryAcquirer {
    streetview: Arc<dyn StreetViewApi>,
    places: Arc<dyn PlacesApi>,
    config: ImageryConfig,
}

impl ImageryAcquirer {
    pub fn new(streetview: Arc<dyn StreetViewApi>, places: Arc<dyn PlacesApi>, config: ImageryConfig) -> Self {
        Self {
            streetview,
            places,
            config,
        }
    }

    pub async fn acquire(&self, candidate: &Candidate) -> Acquisition {
        let mut saw_transient = false;

        let mut samples = match self.streetview.panorama_location(candidate.location).await {
            Ok(Some(panorama)) => {
                let (samples, transient) = self.oriented_samples(candidate, panorama).await;
                saw_transient |= transient;
                samples
            }
            Ok(None) => {
                tracing::debug!(place_id = %candidate.place_id, "No outdoor panorama near candidate");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(place_id = %candidate.place_id, error = %e, "Panorama metadata request failed");
                saw_transient |= e.is_transient();
                Vec::new()
            }
        };

        if samples.is_empty() {
            let (fallback, transient) = self.fallback_samples(candidate).await;
            saw_transient |= transient;
            samples = fallback;
        }

        tracing::debug!(
            place_id = %candidate.place_id,
            images = samples.len(),
            transient = saw_transient,
            "Imagery acquired"
        );

        Acquisition {
            samples,
            transient_failure: saw_transient,
        }
    }

    async fn oriented_samples(
        &self,
        candidate: &Candidate,
        panorama: Coordinate,
    ) -> (Vec<ImageSample>, bool) {
        let base = initial_bearing(panorama, candidate.location);

        let requests: Vec<StreetViewRequest> = self
            .config
            .heading_offsets
            .iter()
            .map(|offset| StreetViewRequest {
                location: panorama,
                heading: heading_degrees(offset_bearing(base, f64::from(*offset))),
                size: self.config.size.clone(),
                fov: self.config.fov,
                pitch: 0,
            })
            .collect();

        let results = join_all(requests.iter().map(|request| self.streetview.image(request))).await;

        let mut samples = Vec::new();
        let mut transient = false;
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(bytes) if bytes.len() > self.config.min_image_bytes => {
                    samples.push(ImageSample::oriented(&candidate.place_id, request.heading, bytes));
                }
                Ok(bytes) => {
                    tracing::debug!(
                        place_id = %candidate.place_id,
                        heading = request.heading,
                        bytes = bytes.len(),
                        "Discarding placeholder image"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        place_id = %candidate.place_id,
                        heading = request.heading,
                        error = %e,
                        "Street-level image request failed"
                    );
                    transient |= e.is_transient();
                }
            }
        }

        (samples, transient)
    }

    async fn fallback_samples(&self, candidate: &Candidate) -> (Vec<ImageSample>, bool) {
        if self.config.max_fallback_photos == 0 {
            return (Vec::new(), false);
        }

        let references = match self.places.photo_references(&candidate.place_id).await {
            Ok(references) => references,
            Err(e) => {
                tracing::warn!(place_id = %candidate.place_id, error = %e, "Place photo lookup failed");
                return (Vec::new(), e.is_transient());
            }
        };

        if references.is_empty() {
            tracing::debug!(place_id = %candidate.place_id, "No place photos available");
            return (Vec::new(), false);
        }

        tracing::info!(
            place_id = %candidate.place_id,
            photos = references.len().min(self.config.max_fallback_photos),
            "No usable street-level image; using place photos"
        );

        let downloads = join_all(
            references
                .iter()
                .take(self.config.max_fallback_photos)
                .map(|reference| self.places.photo(reference, self.config.fallback_max_width)),
        )
        .await;

        let mut samples = Vec::new();
        let mut transient = false;
        for (index, result) in downloads.into_iter().enumerate() {
            match result {
                Ok(bytes) if !bytes.is_empty() => {
                    samples.push(ImageSample::fallback(&candidate.place_id, index, bytes));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(place_id = %candidate.place_id, photo = index, error = %e, "Place photo download failed");
                    transient |= e.is_transient();
                }
            }
        }

        (samples, transient)
    }
}
