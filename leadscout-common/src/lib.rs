//! # leadscout common library
//!
//! Shared code for the leadscout pipeline and any consumer of its durable store:
//! - Lead and region models (the on-disk record format)
//! - Geodesic bearing helpers
//! - TOML configuration loading and root folder resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod geo;
pub mod models;

pub use error::{Error, Result};
pub use geo::Coordinate;
