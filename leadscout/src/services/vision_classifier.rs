//! Binary storefront classification with a run-wide circuit breaker
//!
//! The classifier is biased toward `Negative`: only a connection failure
//! (breaker trip) or a timeout escapes as an error, every other failure is
//! logged and read as "no awning".

use super::api::{VisionApi, VisionError};
use crate::models::ImageSample;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Classification of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Positive,
    Negative,
}

impl Classification {
    pub fn is_positive(&self) -> bool {
        matches!(self, Classification::Positive)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifierError {
    /// Inference endpoint unreachable; the breaker is now open
    #[error("Vision endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("Vision request timed out: {0}")]
    Timeout(String),
}

impl ClassifierError {
    pub fn is_transient(&self) -> bool {
        true
    }
}

/// One-way run-scoped breaker; once tripped it stays open until the process ends
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    tripped: AtomicBool,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the breaker; returns true only for the call that opened it
    pub fn trip(&self) -> bool {
        !self.tripped.swap(true, Ordering::AcqRel)
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

/// Parse a free-text answer: positive iff the token appears, case-insensitively
pub fn parse_answer(answer: &str, affirmative_token: &str) -> Classification {
    let normalized = answer.trim().to_uppercase();
    if normalized.contains(&affirmative_token.to_uppercase()) {
        Classification::Positive
    } else {
        Classification::Negative
    }
}

pub struct VisionClassifier {
    vision: Arc<dyn VisionApi>,
    prompt: String,
    affirmative_token: String,
    breaker: Arc<CircuitBreaker>,
}

impl VisionClassifier {
    pub fn new(
        vision: Arc<dyn VisionApi>,
        prompt: String,
        affirmative_token: String,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            vision,
            prompt,
            affirmative_token,
            breaker,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn classify(&self, sample: &ImageSample) -> Result<Classification, ClassifierError> {
        if self.breaker.is_tripped() {
            return Ok(Classification::Negative);
        }

        match self.vision.query(&sample.bytes, &self.prompt).await {
            Ok(answer) => {
                let classification = parse_answer(&answer, &self.affirmative_token);
                tracing::debug!(
                    place_id = %sample.place_id,
                    heading = %sample.heading,
                    answer = %answer.trim(),
                    ?classification,
                    "Vision answer"
                );
                Ok(classification)
            }
            Err(VisionError::Connection(message)) => {
                if self.breaker.trip() {
                    tracing::error!(
                        error = %message,
                        "Vision endpoint unreachable; skipping classification for the rest of this run"
                    );
                }
                Err(ClassifierError::Unavailable(message))
            }
            Err(VisionError::Timeout(message)) => {
                tracing::warn!(place_id = %sample.place_id, heading = %sample.heading, "Vision request timed out");
                Err(ClassifierError::Timeout(message))
            }
            Err(e) => {
                tracing::warn!(
                    place_id = %sample.place_id,
                    heading = %sample.heading,
                    error = %e,
                    "Vision request failed; treating image as negative"
                );
                Ok(Classification::Negative)
            }
        }
    }
}
