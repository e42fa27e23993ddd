//! Configuration loading and root folder resolution
//!
//! Settings resolve in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: it is logged and the
//! compiled defaults are used.

use crate::models::Region;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data root folder
pub const ROOT_FOLDER_ENV: &str = "LEADSCOUT_ROOT_FOLDER";
/// Environment variable carrying the Maps platform API key
pub const MAPS_API_KEY_ENV: &str = "LEADSCOUT_MAPS_API_KEY";
/// Environment variable overriding the vision inference endpoint
pub const VISION_ENDPOINT_ENV: &str = "LEADSCOUT_VISION_ENDPOINT";

/// Leads dataset file name under the root folder
pub const LEADS_FILENAME: &str = "leads.json";
/// Processed-identifier ledger file name under the root folder
pub const LEDGER_FILENAME: &str = "processed_places.txt";
/// Saved image directory under the root folder
pub const IMAGES_DIRNAME: &str = "images";

pub const DEFAULT_VISION_ENDPOINT: &str = "http://localhost:2020/v1";

pub const DEFAULT_VISION_PROMPT: &str = "Analyze this street view image of a business. \
Does the building display a fabric awning, a cloth covering attached above the storefront? \
It should not be metal or vinyl. Answer with only YES or NO. \
If the presence is uncertain or the awning is only partially visible, answer NO. \
Do not include any additional text.";

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "restaurant",
    "cafe",
    "store",
    "bakery",
    "bar",
    "clothing_store",
    "convenience_store",
    "florist",
    "hardware_store",
    "book_store",
    "shoe_store",
    "gift_shop",
];

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; absent fields take compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data root folder (leads dataset, ledger, saved images)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// Maps platform API key (places, street view)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps_api_key: Option<String>,

    /// Vision inference endpoint base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_endpoint: Option<String>,

    /// Immutable seed dataset used to initialize an empty store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_leads: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub imagery: ImageryConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Places search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub radius_meters: u32,
    pub categories: Vec<String>,
    pub regions: Vec<Region>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_meters: 4000,
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            regions: vec![
                Region::new("New Haven", 41.3083, -72.9279),
                Region::new("Fairfield", 41.147, -73.251639),
            ],
        }
    }
}

/// Street-level imagery parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryConfig {
    /// Requested image size, `WIDTHxHEIGHT`
    pub size: String,
    /// Horizontal field of view in degrees
    pub fov: u16,
    /// Offsets bracketing the computed heading, in degrees
    pub heading_offsets: Vec<i32>,
    /// Responses at or below this size are "no imagery" placeholders
    pub min_image_bytes: usize,
    /// Maximum place photos downloaded when no oriented image is usable
    pub max_fallback_photos: usize,
    /// Width requested for place photos
    pub fallback_max_width: u32,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            size: "800x600".to_string(),
            fov: 90,
            heading_offsets: vec![-25, 0, 25],
            min_image_bytes: 1000,
            max_fallback_photos: 2,
            fallback_max_width: 600,
        }
    }
}

/// Vision classification parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Fixed binary question sent with every image
    pub prompt: String,
    /// Token whose presence marks a positive answer (case-insensitive)
    pub affirmative_token: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_VISION_PROMPT.to_string(),
            affirmative_token: "YES".to_string(),
        }
    }
}

/// Concurrency, pacing and timeout parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent per-candidate pipelines
    pub workers: usize,
    /// Concurrent (region, category) enumerations
    pub enumeration_workers: usize,
    /// Minimum delay before following a pagination token
    pub page_delay_ms: u64,
    pub places_rate_per_sec: u32,
    pub streetview_rate_per_sec: u32,
    /// Vision requests per second; 0 leaves the local server unthrottled
    pub vision_rate_per_sec: u32,
    pub places_timeout_secs: u64,
    pub streetview_metadata_timeout_secs: u64,
    pub streetview_image_timeout_secs: u64,
    pub vision_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            enumeration_workers: 4,
            page_delay_ms: 2000,
            places_rate_per_sec: 10,
            streetview_rate_per_sec: 10,
            vision_rate_per_sec: 0,
            places_timeout_secs: 15,
            streetview_metadata_timeout_secs: 10,
            streetview_image_timeout_secs: 15,
            vision_timeout_secs: 60,
        }
    }
}

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub config_file: Option<PathBuf>,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: get_default_root_folder(),
            config_file: default_config_path(),
            log_level: default_log_level(),
        }
    }
}

/// OS-dependent default root folder
///
/// `~/.local/share/leadscout` on Linux, the platform data dir elsewhere.
pub fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("leadscout"))
        .unwrap_or_else(|| PathBuf::from("./leadscout_data"))
}

/// Default TOML location (`~/.config/leadscout/leadscout.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("leadscout").join("leadscout.toml"))
}

/// Load TOML configuration with graceful degradation
///
/// A missing file yields defaults silently; an unreadable or malformed file
/// yields defaults with a warning.
pub fn load_toml_config(path: &Path) -> TomlConfig {
    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return TomlConfig::default();
    }

    match read_toml_config(path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Strict TOML read, for callers that must not degrade
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write TOML configuration atomically (temp file + rename)
///
/// On Unix the file is restricted to 0600 since it may hold an API key.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = std::fs::write(&temp_path, content) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Sibling temp path used for atomic replacement (`file.ext.tmp`)
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Root folder resolution: CLI → ENV → TOML → compiled default
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml_config: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_value: toml_config.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("Root folder: {} (from command line)", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!("Root folder: {} (from {})", path, ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            info!("Root folder: {} (from TOML)", path.display());
            return path.clone();
        }

        let path = get_default_root_folder();
        info!("Root folder: {} (compiled default)", path.display());
        path
    }
}

/// Creates the root folder layout and names the durable files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.images_dir())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn leads_path(&self) -> PathBuf {
        self.root_folder.join(LEADS_FILENAME)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root_folder.join(LEDGER_FILENAME)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root_folder.join(IMAGES_DIRNAME)
    }
}

/// Resolve the Maps API key: ENV → TOML
pub fn resolve_maps_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(MAPS_API_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_config.maps_api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Maps API key found in both environment and TOML. Using environment.");
    }

    if let Some(key) = env_key {
        info!("Maps API key loaded from environment variable");
        return Ok(key);
    }

    if let Some(key) = toml_key {
        info!("Maps API key loaded from TOML config");
        return Ok(key);
    }

    Err(Error::Config(format!(
        "Maps API key not configured. Please configure using one of:\n\
         1. Environment: {}=your-key-here\n\
         2. TOML config: maps_api_key = \"your-key\"",
        MAPS_API_KEY_ENV
    )))
}

/// Resolve the vision endpoint: CLI → ENV → TOML → default
pub fn resolve_vision_endpoint(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    if let Some(endpoint) = cli_arg {
        return endpoint.to_string();
    }
    if let Ok(endpoint) = std::env::var(VISION_ENDPOINT_ENV) {
        if is_valid_key(&endpoint) {
            return endpoint;
        }
    }
    toml_config
        .vision_endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_VISION_ENDPOINT.to_string())
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
