//! Test helpers: in-memory fakes of the external services
//!
//! Image bytes carry their verdict: images of locations marked positive are
//! filled with `b'Y'`, everything else with `b'N'`. `FakeVision` answers by
//! looking at the first byte, so tests control classification per place.
#![allow(dead_code)]

use async_trait::async_trait;
use leadscout::models::PlaceSummary;
use leadscout::services::{
    NearbyQuery, PlaceDetails, PlacesApi, PlacesPage, ServiceError, StreetViewApi, StreetViewRequest,
    VisionApi, VisionError,
};
use leadscout::{PipelineContext, PipelineSettings};
use leadscout_common::models::Region;
use leadscout_common::Coordinate;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const IMAGE_SIZE: usize = 4096;

pub fn region_alpha() -> Region {
    Region::new("Alpha", 41.0, -73.0)
}

pub fn region_beta() -> Region {
    Region::new("Beta", 42.0, -72.0)
}

/// Distinct location for the n-th test place
pub fn place_location(n: usize) -> Coordinate {
    Coordinate::new(41.0 + n as f64 * 0.001, -73.0)
}

pub fn summary(place_id: &str, n: usize) -> PlaceSummary {
    PlaceSummary {
        place_id: place_id.to_string(),
        name: Some(format!("Shop {}", place_id)),
        location: Some(place_location(n)),
    }
}

/// Two regions, two categories, no page delay
pub fn test_settings(workers: usize) -> PipelineSettings {
    PipelineSettings {
        regions: vec![region_alpha(), region_beta()],
        categories: vec!["cafe".to_string(), "bakery".to_string()],
        workers,
        enumeration_workers: 2,
        page_delay: Duration::ZERO,
        ..PipelineSettings::default()
    }
}

pub fn test_context(
    places: &Arc<FakePlaces>,
    streetview: &Arc<FakeStreetView>,
    vision: &Arc<FakeVision>,
    settings: PipelineSettings,
) -> PipelineContext {
    PipelineContext::new(places.clone(), streetview.clone(), vision.clone(), settings)
}

fn search_key(location: &Coordinate, category: &str) -> String {
    format!("{}|{}", location.to_query_value(), category)
}

/// Places service with scripted search pages, details and photos
#[derive(Default)]
pub struct FakePlaces {
    pages: Mutex<HashMap<String, Vec<Vec<PlaceSummary>>>>,
    failing_searches: Mutex<HashSet<String>>,
    locations: Mutex<HashMap<String, Coordinate>>,
    detail_errors: Mutex<HashMap<String, ServiceError>>,
    photo_references: Mutex<HashMap<String, Vec<String>>>,
    photo_lookup_error: Mutex<Option<ServiceError>>,
    pub search_calls: AtomicUsize,
    pub details_calls: AtomicUsize,
    pub photo_calls: AtomicUsize,
}

impl FakePlaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the pages returned for `(region, category)`
    pub fn with_search(self, region: &Region, category: &str, pages: Vec<Vec<PlaceSummary>>) -> Self {
        {
            let mut locations = self.locations.lock().unwrap();
            for summary in pages.iter().flatten() {
                if let Some(location) = summary.location {
                    locations.insert(summary.place_id.clone(), location);
                }
            }
        }
        self.pages
            .lock()
            .unwrap()
            .insert(search_key(&region.center(), category), pages);
        self
    }

    /// First request for `(region, category)` fails
    pub fn with_failing_search(self, region: &Region, category: &str) -> Self {
        self.failing_searches
            .lock()
            .unwrap()
            .insert(search_key(&region.center(), category));
        self
    }

    pub fn with_detail_error(self, place_id: &str, error: ServiceError) -> Self {
        self.detail_errors.lock().unwrap().insert(place_id.to_string(), error);
        self
    }

    /// References starting with `pos` download as positive images
    pub fn with_photos(self, place_id: &str, references: &[&str]) -> Self {
        self.photo_references.lock().unwrap().insert(
            place_id.to_string(),
            references.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn with_photo_lookup_error(self, error: ServiceError) -> Self {
        *self.photo_lookup_error.lock().unwrap() = Some(error);
        self
    }

    fn page(&self, key: &str, index: usize) -> PlacesPage {
        let pages = self.pages.lock().unwrap();
        let Some(script) = pages.get(key) else {
            return PlacesPage::default();
        };
        let results = script.get(index).cloned().unwrap_or_default();
        let next_page_token = (index + 1 < script.len()).then(|| format!("{}#{}", key, index + 1));
        PlacesPage {
            results,
            next_page_token,
        }
    }
}

#[async_trait]
impl PlacesApi for FakePlaces {
    async fn nearby_search(&self, query: &NearbyQuery) -> Result<PlacesPage, ServiceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        match query {
            NearbyQuery::Search {
                location, category, ..
            } => {
                let key = search_key(location, category);
                if self.failing_searches.lock().unwrap().contains(&key) {
                    return Err(ServiceError::Network("connection reset".to_string()));
                }
                Ok(self.page(&key, 0))
            }
            NearbyQuery::NextPage { token } => {
                let (key, index) = token
                    .rsplit_once('#')
                    .map(|(key, index)| (key.to_string(), index.parse::<usize>().unwrap()))
                    .unwrap();
                Ok(self.page(&key, index))
            }
        }
    }

    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, ServiceError> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.detail_errors.lock().unwrap().get(place_id) {
            return Err(error.clone());
        }
        let location = self.locations.lock().unwrap().get(place_id).copied();
        Ok(PlaceDetails {
            place_id: place_id.to_string(),
            name: Some(format!("Shop {}", place_id)),
            formatted_address: Some(format!("{} Main St", place_id)),
            formatted_phone_number: None,
            location,
            url: Some(format!("https://maps.example/?cid={}", place_id)),
        })
    }

    async fn photo_references(&self, place_id: &str) -> Result<Vec<String>, ServiceError> {
        if let Some(error) = self.photo_lookup_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .photo_references
            .lock()
            .unwrap()
            .get(place_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn photo(&self, photo_reference: &str, _max_width: u32) -> Result<Vec<u8>, ServiceError> {
        self.photo_calls.fetch_add(1, Ordering::SeqCst);
        let marker = if photo_reference.starts_with("pos") { b'Y' } else { b'N' };
        Ok(vec![marker; IMAGE_SIZE])
    }
}

/// How the fake answers panorama lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanoramaMode {
    /// Panorama at the requested location
    Present,
    /// No outdoor coverage
    Absent,
    /// Metadata request fails at network level
    Unreachable,
}

/// Street-level imagery service; images of positive locations are `b'Y'`
pub struct FakeStreetView {
    mode: PanoramaMode,
    positive: Mutex<HashSet<String>>,
    image_size: usize,
    timeout_heading: Option<u16>,
    pub image_calls: AtomicUsize,
    pub headings: Mutex<Vec<u16>>,
}

impl FakeStreetView {
    pub fn new(mode: PanoramaMode) -> Self {
        Self {
            mode,
            positive: Mutex::new(HashSet::new()),
            image_size: IMAGE_SIZE,
            timeout_heading: None,
            image_calls: AtomicUsize::new(0),
            headings: Mutex::new(Vec::new()),
        }
    }

    /// Every image returned is this many bytes
    pub fn with_image_size(mut self, size: usize) -> Self {
        self.image_size = size;
        self
    }

    /// Requests at this heading time out
    pub fn with_timeout_heading(mut self, heading: u16) -> Self {
        self.timeout_heading = Some(heading);
        self
    }

    /// Images taken at this location show an awning
    pub fn with_positive(self, location: Coordinate) -> Self {
        self.positive.lock().unwrap().insert(location.to_query_value());
        self
    }
}

#[async_trait]
impl StreetViewApi for FakeStreetView {
    async fn panorama_location(&self, location: Coordinate) -> Result<Option<Coordinate>, ServiceError> {
        match self.mode {
            PanoramaMode::Present => Ok(Some(location)),
            PanoramaMode::Absent => Ok(None),
            PanoramaMode::Unreachable => Err(ServiceError::Timeout("metadata".to_string())),
        }
    }

    async fn image(&self, request: &StreetViewRequest) -> Result<Vec<u8>, ServiceError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.headings.lock().unwrap().push(request.heading);
        if self.timeout_heading == Some(request.heading) {
            return Err(ServiceError::Timeout(format!("heading {}", request.heading)));
        }
        let positive = self
            .positive
            .lock()
            .unwrap()
            .contains(&request.location.to_query_value());
        let marker = if positive { b'Y' } else { b'N' };
        Ok(vec![marker; self.image_size])
    }
}

/// How the fake vision server behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionMode {
    /// Answers by image content
    Healthy,
    /// Connection refused
    Down,
    /// Every request times out
    Slow,
}

pub struct FakeVision {
    mode: VisionMode,
    latency: Duration,
    pub calls: AtomicUsize,
}

impl FakeVision {
    pub fn new(mode: VisionMode) -> Self {
        Self {
            mode,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every answer arrives after `latency`, so concurrent candidates overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionApi for FakeVision {
    async fn query(&self, image: &[u8], _prompt: &str) -> Result<String, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.mode {
            VisionMode::Healthy => Ok(if image.first() == Some(&b'Y') {
                " Yes.".to_string()
            } else {
                "No".to_string()
            }),
            VisionMode::Down => Err(VisionError::Connection("connection refused".to_string())),
            VisionMode::Slow => Err(VisionError::Timeout("deadline elapsed".to_string())),
        }
    }
}
