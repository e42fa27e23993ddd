//! Per-candidate outcomes and the end-of-run summary

use serde::{Deserialize, Serialize};

/// Terminal state of one candidate's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// At least one image classified positive; lead persisted
    Leaded,
    /// No usable image, no positive classification, or unusable candidate
    Rejected,
    /// Network failure or timeout; retried next run
    Transient,
    /// Classifier breaker open; retried next run
    SkippedBreakerOpen,
    /// Shutdown requested before the candidate started
    Cancelled,
    /// Lead or ledger write failed; retried next run
    PersistenceFailed,
}

impl CandidateOutcome {
    /// Whether this outcome is recorded in the processed ledger
    pub fn is_ledgered(&self) -> bool {
        matches!(self, CandidateOutcome::Leaded | CandidateOutcome::Rejected)
    }
}

/// End-of-run report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub regions: usize,
    /// Unique places found by enumeration (before ledger filtering)
    pub discovered: usize,
    /// Places skipped because the ledger already holds them
    pub previously_processed: usize,
    /// Candidates that reached a terminal state this run
    pub checked: usize,
    pub leads_found: usize,
    pub rejected: usize,
    pub transient_failures: usize,
    pub breaker_skipped: usize,
    pub persistence_failures: usize,
    pub cancelled: usize,
    /// Classification curtailed by the circuit breaker
    pub breaker_tripped: bool,
    /// Shutdown requested during the run
    pub shutdown_requested: bool,
}

impl RunSummary {
    pub fn record(&mut self, outcome: CandidateOutcome) {
        match outcome {
            CandidateOutcome::Leaded => {
                self.checked += 1;
                self.leads_found += 1;
            }
            CandidateOutcome::Rejected => {
                self.checked += 1;
                self.rejected += 1;
            }
            CandidateOutcome::Transient => {
                self.checked += 1;
                self.transient_failures += 1;
            }
            CandidateOutcome::PersistenceFailed => {
                self.checked += 1;
                self.persistence_failures += 1;
            }
            CandidateOutcome::SkippedBreakerOpen => self.breaker_skipped += 1,
            CandidateOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Non-zero when any persistence failure occurred
    pub fn exit_code(&self) -> i32 {
        if self.persistence_failures > 0 {
            1
        } else {
            0
        }
    }

    pub fn display_string(&self) -> String {
        let mut text = format!(
            "Checked {} businesses ({} new of {} discovered, {} previously processed). \
             Leads found: {}. Rejected: {}. Retry next run: {}.",
            self.checked,
            self.discovered.saturating_sub(self.previously_processed),
            self.discovered,
            self.previously_processed,
            self.leads_found,
            self.rejected,
            self.transient_failures + self.breaker_skipped + self.persistence_failures + self.cancelled,
        );
        if self.breaker_tripped {
            text.push_str(" WARNING: vision analysis was stopped early; the classifier was unreachable.");
        }
        if self.persistence_failures > 0 {
            text.push_str(&format!(
                " ERROR: {} candidate(s) could not be saved.",
                self.persistence_failures
            ));
        }
        text
    }
}
