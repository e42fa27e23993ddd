//! Run configuration resolution
//!
//! Merges command-line overrides with the layered TOML/ENV configuration
//! from `leadscout_common::config` into one `ScoutConfig` for the run.
//! Priority everywhere: CLI → ENV → TOML → compiled default.

use leadscout_common::config::{
    resolve_maps_api_key, resolve_vision_endpoint, ImageryConfig, RootFolderResolver, SearchConfig,
    TomlConfig, VisionConfig,
};
use leadscout_common::models::Region;
use leadscout_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub vision_endpoint: Option<String>,
    pub workers: Option<usize>,
}

/// Everything the pipeline components need beyond their clients
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub regions: Vec<Region>,
    pub categories: Vec<String>,
    pub radius_meters: u32,
    pub imagery: ImageryConfig,
    pub vision: VisionConfig,
    pub workers: usize,
    pub enumeration_workers: usize,
    pub page_delay: Duration,
}

impl PipelineSettings {
    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        let SearchConfig {
            radius_meters,
            categories,
            regions,
        } = toml_config.search.clone();
        let pipeline = &toml_config.pipeline;

        Self {
            regions,
            categories,
            radius_meters,
            imagery: toml_config.imagery.clone(),
            vision: toml_config.vision.clone(),
            workers: pipeline.workers.max(1),
            enumeration_workers: pipeline.enumeration_workers.max(1),
            page_delay: Duration::from_millis(pipeline.page_delay_ms),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

/// Client timeouts and quotas
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    pub places_timeout: Duration,
    pub places_rate_per_sec: u32,
    pub streetview_metadata_timeout: Duration,
    pub streetview_image_timeout: Duration,
    pub streetview_rate_per_sec: u32,
    pub vision_timeout: Duration,
    /// `None` when vision requests are not throttled
    pub vision_rate_per_sec: Option<u32>,
}

impl ClientSettings {
    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        let pipeline = &toml_config.pipeline;
        Self {
            places_timeout: Duration::from_secs(pipeline.places_timeout_secs),
            places_rate_per_sec: pipeline.places_rate_per_sec,
            streetview_metadata_timeout: Duration::from_secs(pipeline.streetview_metadata_timeout_secs),
            streetview_image_timeout: Duration::from_secs(pipeline.streetview_image_timeout_secs),
            streetview_rate_per_sec: pipeline.streetview_rate_per_sec,
            vision_timeout: Duration::from_secs(pipeline.vision_timeout_secs),
            vision_rate_per_sec: (pipeline.vision_rate_per_sec > 0).then_some(pipeline.vision_rate_per_sec),
        }
    }
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub root_folder: PathBuf,
    pub maps_api_key: String,
    pub vision_endpoint: String,
    pub seed_leads: Option<PathBuf>,
    pub settings: PipelineSettings,
    pub clients: ClientSettings,
}

impl ScoutConfig {
    /// Resolve every setting; fails only when no Maps API key is configured
    pub fn resolve(overrides: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let root_folder = RootFolderResolver::new(overrides.root_folder.clone(), toml_config).resolve();
        let maps_api_key = resolve_maps_api_key(toml_config)?;
        let vision_endpoint = resolve_vision_endpoint(overrides.vision_endpoint.as_deref(), toml_config);

        let mut settings = PipelineSettings::from_toml(toml_config);
        if let Some(workers) = overrides.workers {
            if workers == 0 {
                return Err(Error::InvalidInput("--workers must be at least 1".to_string()));
            }
            info!("Workers: {} (from command line)", workers);
            settings.workers = workers;
        }

        if settings.regions.is_empty() {
            return Err(Error::Config("No search regions configured ([search].regions)".to_string()));
        }

        Ok(Self {
            root_folder,
            maps_api_key,
            vision_endpoint,
            seed_leads: toml_config.seed_leads.clone(),
            settings,
            clients: ClientSettings::from_toml(toml_config),
        })
    }
}
