//! Street View Static API client
//!
//! Panorama metadata lookup (outdoor sources only) and oriented image
//! requests. Metadata and image calls carry separate timeouts.

use super::api::{ServiceError, StreetViewApi, StreetViewRequest};
use super::{rate_limiter, DirectRateLimiter, MAPS_BASE_URL, USER_AGENT};
use async_trait::async_trait;
use leadscout_common::Coordinate;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    status: String,
    location: Option<MetadataLocation>,
}

#[derive(Debug, Deserialize)]
struct MetadataLocation {
    lat: f64,
    lng: f64,
}

/// Street View API client
pub struct StreetViewClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    metadata_timeout: Duration,
    image_timeout: Duration,
    rate_limiter: DirectRateLimiter,
}

impl StreetViewClient {
    pub fn new(
        api_key: String,
        metadata_timeout: Duration,
        image_timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, ServiceError> {
        Self::with_base_url(
            MAPS_BASE_URL.to_string(),
            api_key,
            metadata_timeout,
            image_timeout,
            requests_per_second,
        )
    }

    pub fn with_base_url(
        base_url: String,
        api_key: String,
        metadata_timeout: Duration,
        image_timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            metadata_timeout,
            image_timeout,
            rate_limiter: rate_limiter(requests_per_second),
        })
    }
}

#[async_trait]
impl StreetViewApi for StreetViewClient {
    async fn panorama_location(&self, location: Coordinate) -> Result<Option<Coordinate>, ServiceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/streetview/metadata", self.base_url);
        let location_param = location.to_query_value();
        let response = self
            .http_client
            .get(&url)
            .timeout(self.metadata_timeout)
            .query(&[
                ("location", location_param.as_str()),
                ("source", "outdoor"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(ServiceError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api(status.as_u16(), "streetview metadata".to_string()));
        }

        let metadata: MetadataResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        match metadata.status.as_str() {
            "OK" => match metadata.location {
                Some(pano) => Ok(Some(Coordinate::new(pano.lat, pano.lng))),
                None => Err(ServiceError::Parse("metadata OK without location".to_string())),
            },
            "ZERO_RESULTS" | "NOT_FOUND" => Ok(None),
            "OVER_QUERY_LIMIT" => Err(ServiceError::Api(429, metadata.status)),
            "UNKNOWN_ERROR" => Err(ServiceError::Api(500, metadata.status)),
            _ => Err(ServiceError::Api(400, metadata.status)),
        }
    }

    async fn image(&self, request: &StreetViewRequest) -> Result<Vec<u8>, ServiceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/streetview", self.base_url);
        let location_param = request.location.to_query_value();
        let fov = request.fov.to_string();
        let heading = request.heading.to_string();
        let pitch = request.pitch.to_string();

        let response = self
            .http_client
            .get(&url)
            .timeout(self.image_timeout)
            .query(&[
                ("location", location_param.as_str()),
                ("size", request.size.as_str()),
                ("fov", fov.as_str()),
                ("heading", heading.as_str()),
                ("pitch", pitch.as_str()),
                ("source", "outdoor"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(ServiceError::from_reqwest)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!("heading {}", request.heading)));
        }
        if !status.is_success() {
            return Err(ServiceError::Api(status.as_u16(), format!("heading {}", request.heading)));
        }

        let bytes = response.bytes().await.map_err(ServiceError::from_reqwest)?;
        Ok(bytes.to_vec())
    }
}
