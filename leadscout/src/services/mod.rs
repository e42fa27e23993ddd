//! Service modules for the discovery-and-classification pipeline
//!
//! Leaves first: HTTP clients behind the `api` traits, then the pipeline
//! components built on them, then the durable lead store.

pub mod api;
pub mod candidate_enumerator;
pub mod detail_enricher;
pub mod imagery_acquirer;
pub mod lead_store;
pub mod moondream_client;
pub mod places_client;
pub mod streetview_client;
pub mod vision_classifier;

pub use api::{
    NearbyQuery, PlaceDetails, PlacesApi, PlacesPage, ServiceError, StreetViewApi,
    StreetViewRequest, VisionApi, VisionError,
};
pub use candidate_enumerator::{CandidateEnumerator, Discovery};
pub use detail_enricher::{DetailEnricher, EnrichError};
pub use imagery_acquirer::{Acquisition, ImageryAcquirer};
pub use lead_store::{LeadStore, StoreError};
pub use moondream_client::MoondreamClient;
pub use places_client::GooglePlacesClient;
pub use streetview_client::StreetViewClient;
pub use vision_classifier::{CircuitBreaker, Classification, ClassifierError, VisionClassifier};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

/// Default base URL of the Maps platform web services
pub const MAPS_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

pub(crate) const USER_AGENT: &str = concat!("leadscout/", env!("CARGO_PKG_VERSION"));

/// Token bucket shared by every call site of one client
pub(crate) type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Build a limiter allowing `per_second` requests per second (minimum 1)
pub(crate) fn rate_limiter(per_second: u32) -> DirectRateLimiter {
    let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    RateLimiter::direct(quota)
}
