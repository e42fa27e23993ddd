//! Pipeline data model
//!
//! Durable records (`Lead`, `Region`) live in `leadscout_common::models`;
//! these are the in-flight types owned by a single run.

pub mod candidate;
pub mod image_sample;
pub mod run_summary;

pub use candidate::{Candidate, DiscoveredPlace, PlaceSummary};
pub use image_sample::{HeadingLabel, ImageSample, ImageSource};
pub use run_summary::{CandidateOutcome, RunSummary};
