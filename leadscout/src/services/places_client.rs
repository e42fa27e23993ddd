//! Google Places web service client
//!
//! Nearby search with pagination, place details, photo references and photo
//! download. All calls share one governor quota and carry the client timeout.

use super::api::{NearbyQuery, PlaceDetails, PlacesApi, PlacesPage, ServiceError};
use super::{rate_limiter, DirectRateLimiter, MAPS_BASE_URL, USER_AGENT};
use crate::models::PlaceSummary;
use async_trait::async_trait;
use leadscout_common::Coordinate;
use serde::Deserialize;
use std::time::Duration;

/// Detail fields requested for enrichment
const DETAIL_FIELDS: &str = "name,formatted_address,formatted_phone_number,geometry/location,place_id,url";

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<NearbyResult>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyResult {
    place_id: Option<String>,
    name: Option<String>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse<T> {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct DetailsResult {
    place_id: Option<String>,
    name: Option<String>,
    formatted_address: Option<String>,
    formatted_phone_number: Option<String>,
    geometry: Option<Geometry>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotosResult {
    #[serde(default)]
    photos: Vec<PhotoEntry>,
}

#[derive(Debug, Deserialize)]
struct PhotoEntry {
    photo_reference: Option<String>,
}

fn location_of(geometry: Option<Geometry>) -> Option<Coordinate> {
    geometry
        .and_then(|g| g.location)
        .map(|l| Coordinate::new(l.lat, l.lng))
}

/// Map a Places `status` field to an error, if it is one
///
/// `ZERO_RESULTS` is success for searches; detail lookups treat it as
/// `NotFound` themselves.
fn check_status(status: &str, error_message: Option<String>, context: &str) -> Result<(), ServiceError> {
    let detail = || match &error_message {
        Some(message) => format!("{} ({}): {}", status, context, message),
        None => format!("{} ({})", status, context),
    };

    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "NOT_FOUND" => Err(ServiceError::NotFound(context.to_string())),
        "OVER_QUERY_LIMIT" => Err(ServiceError::Api(429, detail())),
        "UNKNOWN_ERROR" => Err(ServiceError::Api(500, detail())),
        _ => Err(ServiceError::Api(400, detail())),
    }
}

/// Google Places API client
pub struct GooglePlacesClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: DirectRateLimiter,
}

impl GooglePlacesClient {
    pub fn new(api_key: String, timeout: Duration, requests_per_second: u32) -> Result<Self, ServiceError> {
        Self::with_base_url(MAPS_BASE_URL.to_string(), api_key, timeout, requests_per_second)
    }

    /// Client against an alternate base URL (proxies, test servers)
    pub fn with_base_url(
        base_url: String,
        api_key: String,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            rate_limiter: rate_limiter(requests_per_second),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ServiceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(ServiceError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(status.as_u16(), error_text));
        }

        response.json::<T>().await.map_err(|e| ServiceError::Parse(e.to_string()))
    }

    async fn details_result<T: serde::de::DeserializeOwned>(
        &self,
        place_id: &str,
        fields: &str,
    ) -> Result<T, ServiceError> {
        let response: DetailsResponse<T> = self
            .get_json("place/details/json", &[("place_id", place_id), ("fields", fields)])
            .await?;

        if response.status == "ZERO_RESULTS" {
            return Err(ServiceError::NotFound(place_id.to_string()));
        }
        check_status(&response.status, response.error_message, place_id)?;

        response
            .result
            .ok_or_else(|| ServiceError::NotFound(place_id.to_string()))
    }
}

#[async_trait]
impl PlacesApi for GooglePlacesClient {
    async fn nearby_search(&self, query: &NearbyQuery) -> Result<PlacesPage, ServiceError> {
        let response: NearbyResponse = match query {
            NearbyQuery::Search {
                location,
                radius_meters,
                category,
            } => {
                tracing::debug!(location = %location, radius_meters, category = %category, "Nearby search");
                let location = location.to_query_value();
                let radius = radius_meters.to_string();
                self.get_json(
                    "place/nearbysearch/json",
                    &[
                        ("location", location.as_str()),
                        ("radius", radius.as_str()),
                        ("type", category.as_str()),
                    ],
                )
                .await?
            }
            NearbyQuery::NextPage { token } => {
                tracing::debug!("Nearby search: following page token");
                self.get_json("place/nearbysearch/json", &[("pagetoken", token.as_str())])
                    .await?
            }
        };

        check_status(&response.status, response.error_message, "nearbysearch")?;

        let results = response
            .results
            .into_iter()
            .filter_map(|r| {
                Some(PlaceSummary {
                    place_id: r.place_id?,
                    name: r.name,
                    location: location_of(r.geometry),
                })
            })
            .collect();

        Ok(PlacesPage {
            results,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, ServiceError> {
        let result: DetailsResult = self.details_result(place_id, DETAIL_FIELDS).await?;

        Ok(PlaceDetails {
            place_id: result.place_id.unwrap_or_else(|| place_id.to_string()),
            name: result.name,
            formatted_address: result.formatted_address,
            formatted_phone_number: result.formatted_phone_number,
            location: location_of(result.geometry),
            url: result.url,
        })
    }

    async fn photo_references(&self, place_id: &str) -> Result<Vec<String>, ServiceError> {
        let result: PhotosResult = self.details_result(place_id, "photos").await?;
        Ok(result
            .photos
            .into_iter()
            .filter_map(|p| p.photo_reference)
            .collect())
    }

    async fn photo(&self, photo_reference: &str, max_width: u32) -> Result<Vec<u8>, ServiceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/place/photo", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("maxwidth", max_width.to_string().as_str()),
                ("photoreference", photo_reference),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(ServiceError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api(status.as_u16(), "place photo".to_string()));
        }

        let bytes = response.bytes().await.map_err(ServiceError::from_reqwest)?;
        Ok(bytes.to_vec())
    }
}
