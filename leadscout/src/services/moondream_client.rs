//! Moondream vision server client
//!
//! `POST {endpoint}/query` with the image as a base64 data URL and the
//! question as text; the answer comes back in the `answer` field. An
//! optional token bucket paces requests across all concurrent candidates.

use super::api::{VisionApi, VisionError};
use super::{rate_limiter, DirectRateLimiter, USER_AGENT};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    image_url: String,
    question: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    answer: String,
}

/// Local Moondream inference server client
pub struct MoondreamClient {
    http_client: reqwest::Client,
    endpoint: String,
    rate_limiter: Option<DirectRateLimiter>,
}

impl MoondreamClient {
    /// `requests_per_second` of `None` sends requests as fast as workers issue them
    pub fn new(endpoint: String, timeout: Duration, requests_per_second: Option<u32>) -> Result<Self, VisionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| VisionError::Connection(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            rate_limiter: requests_per_second.map(rate_limiter),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Encode image bytes as a data URL, sniffing PNG vs JPEG
pub(crate) fn image_data_url(image: &[u8]) -> String {
    let mime = if image.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else {
        "image/jpeg"
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(image))
}

#[async_trait]
impl VisionApi for MoondreamClient {
    async fn query(&self, image: &[u8], prompt: &str) -> Result<String, VisionError> {
        let url = format!("{}/query", self.endpoint);
        let body = QueryRequest {
            image_url: image_data_url(image),
            question: prompt,
            stream: false,
        };

        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        tracing::debug!(endpoint = %self.endpoint, image_bytes = image.len(), "Sending image to vision server");

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(VisionError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VisionError::Api(status.as_u16(), error_text));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        Ok(parsed.answer)
    }
}
