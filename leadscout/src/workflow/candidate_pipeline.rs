//! Per-candidate state machine
//!
//! `Discovered → Enriched → ImageryAcquired → Classified → (Leaded | Rejected)`
//!
//! Runs everything up to the terminal decision. Persistence (images, lead,
//! ledger) belongs to the single consumer in `PipelineOrchestrator`, which
//! turns a `Leaded`/`Rejected` report into durable state.

use super::context::PipelineContext;
use crate::error::PipelineError;
use crate::models::{Candidate, CandidateOutcome, DiscoveredPlace, ImageSample};
use crate::services::{ClassifierError, EnrichError};
use tokio_util::sync::CancellationToken;

/// What happened to one candidate before persistence
#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub place_id: String,
    pub name: String,
    pub outcome: CandidateOutcome,
    /// Present once enrichment succeeded
    pub candidate: Option<Candidate>,
    /// Samples that classified positive, in acquisition order
    pub positives: Vec<ImageSample>,
}

impl CandidateReport {
    fn new(place: &DiscoveredPlace, outcome: CandidateOutcome) -> Self {
        Self {
            place_id: place.summary.place_id.clone(),
            name: place.summary.display_name().to_string(),
            outcome,
            candidate: None,
            positives: Vec::new(),
        }
    }
}

/// Map a failure to the candidate outcome it implies
pub fn outcome_for(error: &PipelineError) -> CandidateOutcome {
    match error {
        PipelineError::InvalidCandidate(_) => CandidateOutcome::Rejected,
        PipelineError::TransientNetwork(_) | PipelineError::Common(_) => CandidateOutcome::Transient,
        PipelineError::ExternalServiceUnavailable(_) => CandidateOutcome::SkippedBreakerOpen,
        PipelineError::Persistence(_) | PipelineError::Io(_) => CandidateOutcome::PersistenceFailed,
    }
}

pub async fn process_candidate(
    context: &PipelineContext,
    place: &DiscoveredPlace,
    cancel: &CancellationToken,
) -> CandidateReport {
    if cancel.is_cancelled() {
        return CandidateReport::new(place, CandidateOutcome::Cancelled);
    }
    if context.breaker.is_tripped() {
        return CandidateReport::new(place, CandidateOutcome::SkippedBreakerOpen);
    }

    let candidate = match context.enricher.enrich(&place.summary, &place.region).await {
        Ok(candidate) => candidate,
        Err(e) => {
            let error = match e {
                EnrichError::NotFound(id) => PipelineError::InvalidCandidate(format!("{} no longer exists", id)),
                EnrichError::Invalid(message) => PipelineError::InvalidCandidate(message),
                EnrichError::Transient(inner) => PipelineError::TransientNetwork(inner.to_string()),
            };
            tracing::warn!(place_id = %place.summary.place_id, error = %error, "Enrichment failed");
            return CandidateReport::new(place, outcome_for(&error));
        }
    };

    let mut report = CandidateReport::new(place, CandidateOutcome::Rejected);
    report.name = candidate.name.clone();

    match classify_candidate(context, &candidate).await {
        Ok(positives) if !positives.is_empty() => {
            tracing::info!(
                place_id = %candidate.place_id,
                name = %candidate.name,
                positives = positives.len(),
                "Awning detected"
            );
            report.outcome = CandidateOutcome::Leaded;
            report.positives = positives;
        }
        Ok(_) => {
            report.outcome = CandidateOutcome::Rejected;
        }
        Err(error) => {
            tracing::debug!(place_id = %candidate.place_id, error = %error, "Candidate not resolved this run");
            report.outcome = outcome_for(&error);
        }
    }

    report.candidate = Some(candidate);
    report
}

/// Acquire and classify every image, returning the positives
///
/// Any positive wins regardless of later failures. With no positive, an open
/// breaker skips the candidate, and a timeout in imagery or vision makes it
/// transient: a missing image may have been the one showing the awning.
async fn classify_candidate(context: &PipelineContext, candidate: &Candidate) -> Result<Vec<ImageSample>, PipelineError> {
    let acquisition = context.acquirer.acquire(candidate).await;

    if acquisition.samples.is_empty() {
        if acquisition.transient_failure {
            return Err(PipelineError::TransientNetwork(format!(
                "imagery unavailable for {}",
                candidate.place_id
            )));
        }
        tracing::info!(place_id = %candidate.place_id, name = %candidate.name, "No usable imagery; rejecting");
        return Ok(Vec::new());
    }

    let imagery_incomplete = acquisition.transient_failure;
    let mut positives = Vec::new();
    let mut timed_out = false;

    for sample in acquisition.samples {
        match context.classifier.classify(&sample).await {
            Ok(classification) if classification.is_positive() => positives.push(sample),
            Ok(_) => {}
            Err(ClassifierError::Timeout(_)) => timed_out = true,
            Err(ClassifierError::Unavailable(_)) => {}
        }
    }

    if !positives.is_empty() {
        return Ok(positives);
    }
    if context.breaker.is_tripped() {
        return Err(PipelineError::ExternalServiceUnavailable(
            "vision endpoint unreachable".to_string(),
        ));
    }
    if timed_out {
        return Err(PipelineError::TransientNetwork(format!(
            "vision timed out for {}",
            candidate.place_id
        )));
    }
    if imagery_incomplete {
        return Err(PipelineError::TransientNetwork(format!(
            "imagery incomplete for {}",
            candidate.place_id
        )));
    }
    Ok(positives)
}
