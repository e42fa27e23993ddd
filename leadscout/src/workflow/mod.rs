//! Discovery-and-classification run
//!
//! # Flow
//! 1. Enumerate every (region, category) pair, dedupe, drop ledgered ids
//! 2. Process candidates `workers` at a time (enrich → imagery → classify)
//! 3. Persist results in discovery order from a single consumer loop
//!
//! Shutdown via the cancellation token stops new candidates from starting;
//! candidates already in flight finish and their writes complete.

pub mod candidate_pipeline;
pub mod context;

pub use candidate_pipeline::{outcome_for, process_candidate, CandidateReport};
pub use context::PipelineContext;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{CandidateOutcome, RunSummary};
use crate::services::LeadStore;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Log progress every this many candidates
const PROGRESS_INTERVAL: usize = 10;

pub struct PipelineOrchestrator {
    context: Arc<PipelineContext>,
    store: Arc<LeadStore>,
    cancel: CancellationToken,
}

impl PipelineOrchestrator {
    pub fn new(context: Arc<PipelineContext>, store: Arc<LeadStore>, cancel: CancellationToken) -> Self {
        Self { context, store, cancel }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute one complete run
    pub async fn run(&self) -> PipelineResult<RunSummary> {
        let settings = &self.context.settings;
        let mut summary = RunSummary {
            regions: settings.regions.len(),
            ..Default::default()
        };

        let processed = self.store.processed_ids().await;
        tracing::info!(
            regions = settings.regions.len(),
            categories = settings.categories.len(),
            previously_processed = processed.len(),
            "Starting discovery"
        );

        let discovery = tokio::select! {
            discovery = self.context.enumerator.discover(&settings.regions, &settings.categories, &processed) => discovery,
            _ = self.cancel.cancelled() => {
                tracing::warn!("Shutdown requested during discovery; no candidates processed");
                summary.shutdown_requested = true;
                return Ok(summary);
            }
        };

        summary.discovered = discovery.unique_seen;
        summary.previously_processed = discovery.previously_processed;
        let total = discovery.places.len();

        tracing::info!(
            candidates = total,
            workers = settings.workers,
            "Checking street-level imagery and vision classification"
        );

        let context = &self.context;
        let cancel = &self.cancel;
        let mut reports = stream::iter(discovery.places.iter())
            .map(|place| candidate_pipeline::process_candidate(context, place, cancel))
            .buffered(settings.workers);

        let mut completed = 0usize;
        while let Some(report) = reports.next().await {
            completed += 1;
            let outcome = self.persist(&report).await;
            summary.record(outcome);

            tracing::debug!(
                place_id = %report.place_id,
                name = %report.name,
                ?outcome,
                "[{}/{}] Candidate finished",
                completed,
                total
            );
            if completed % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    completed,
                    total,
                    leads = summary.leads_found,
                    "Progress"
                );
            }
        }

        summary.breaker_tripped = self.context.breaker.is_tripped();
        summary.shutdown_requested = self.cancel.is_cancelled();

        tracing::info!("{}", summary.display_string());
        Ok(summary)
    }

    /// Make a report's terminal outcome durable; returns the final outcome
    async fn persist(&self, report: &CandidateReport) -> CandidateOutcome {
        let result = match report.outcome {
            CandidateOutcome::Leaded => self.persist_lead(report).await,
            CandidateOutcome::Rejected => self.store.mark_processed(&report.place_id).await.map_err(PipelineError::from),
            other => return other,
        };

        match result {
            Ok(()) => report.outcome,
            Err(e) => {
                tracing::error!(
                    place_id = %report.place_id,
                    error = %e,
                    "Failed to persist result; candidate will be retried next run"
                );
                outcome_for(&e)
            }
        }
    }

    /// Images, then the lead, then the ledger entry
    async fn persist_lead(&self, report: &CandidateReport) -> PipelineResult<()> {
        let candidate = report
            .candidate
            .as_ref()
            .ok_or_else(|| PipelineError::Persistence(format!("lead {} has no candidate", report.place_id)))?;

        let mut image_paths = Vec::with_capacity(report.positives.len());
        for sample in &report.positives {
            image_paths.push(self.store.save_image(sample).await?);
        }

        self.store.append_if_new(candidate, image_paths).await?;
        self.store.mark_processed(&candidate.place_id).await?;
        Ok(())
    }
}
