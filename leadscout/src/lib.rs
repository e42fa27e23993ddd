//! leadscout library interface
//!
//! Discovers storefronts with fabric awnings: enumerate businesses around
//! configured regions, look at each storefront from the street, ask a local
//! vision model, and keep the positives as reviewable leads.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::config::{CliOverrides, PipelineSettings, ScoutConfig};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::workflow::{PipelineContext, PipelineOrchestrator};

/// Build identification captured by `build.rs`
pub fn build_info() -> String {
    format!(
        "{} ({} {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    )
}
