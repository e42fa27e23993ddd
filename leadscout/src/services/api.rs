//! External service seams
//!
//! Every external collaborator sits behind a trait so pipeline components
//! depend on behavior, not on HTTP. Production implementations live in
//! `places_client`, `streetview_client` and `moondream_client`.

use crate::models::PlaceSummary;
use async_trait::async_trait;
use leadscout_common::Coordinate;
use thiserror::Error;

/// Places / street view client errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ServiceError {
    /// Retrying later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Network(_) | ServiceError::Timeout(_) => true,
            ServiceError::Api(status, _) => *status == 429 || *status >= 500,
            ServiceError::NotFound(_) | ServiceError::Parse(_) => false,
        }
    }

    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ServiceError::Timeout(error.to_string())
        } else if error.is_decode() {
            ServiceError::Parse(error.to_string())
        } else {
            ServiceError::Network(error.to_string())
        }
    }
}

/// Vision inference client errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VisionError {
    /// Endpoint could not be reached at all
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl VisionError {
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_connect() {
            VisionError::Connection(error.to_string())
        } else if error.is_timeout() {
            VisionError::Timeout(error.to_string())
        } else if error.is_decode() {
            VisionError::Parse(error.to_string())
        } else if error.is_request() {
            VisionError::Connection(error.to_string())
        } else {
            VisionError::Api(error.status().map(|s| s.as_u16()).unwrap_or(0), error.to_string())
        }
    }
}

/// Nearby search request: first page, or a follow-up page by cursor
#[derive(Debug, Clone, PartialEq)]
pub enum NearbyQuery {
    Search {
        location: Coordinate,
        radius_meters: u32,
        category: String,
    },
    NextPage {
        token: String,
    },
}

/// One page of nearby-search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacesPage {
    pub results: Vec<PlaceSummary>,
    pub next_page_token: Option<String>,
}

/// Extended attributes for one place
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceDetails {
    pub place_id: String,
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    pub formatted_phone_number: Option<String>,
    pub location: Option<Coordinate>,
    pub url: Option<String>,
}

/// Street-level image request
#[derive(Debug, Clone, PartialEq)]
pub struct StreetViewRequest {
    /// Panorama coordinate (not the raw candidate coordinate)
    pub location: Coordinate,
    pub heading: u16,
    pub size: String,
    pub fov: u16,
    pub pitch: i16,
}

/// Places-search service
#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn nearby_search(&self, query: &NearbyQuery) -> Result<PlacesPage, ServiceError>;

    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, ServiceError>;

    /// Photo references for a place, in service order
    async fn photo_references(&self, place_id: &str) -> Result<Vec<String>, ServiceError>;

    async fn photo(&self, photo_reference: &str, max_width: u32) -> Result<Vec<u8>, ServiceError>;
}

/// Street-level imagery metadata and acquisition service
#[async_trait]
pub trait StreetViewApi: Send + Sync {
    /// Nearest outdoor panorama to `location`, or `None` when there is none
    async fn panorama_location(&self, location: Coordinate) -> Result<Option<Coordinate>, ServiceError>;

    /// Image bytes; a non-success status is `ServiceError::Api`
    async fn image(&self, request: &StreetViewRequest) -> Result<Vec<u8>, ServiceError>;
}

/// Vision inference service
#[async_trait]
pub trait VisionApi: Send + Sync {
    /// Ask `prompt` about `image`; returns the raw textual answer
    async fn query(&self, image: &[u8], prompt: &str) -> Result<String, VisionError>;
}
