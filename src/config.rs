use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Assumed average minibus speed for ETA estimates (km/h)
    #[serde(default = "Config::default_average_speed_kmh")]
    pub average_speed_kmh: f64,
    /// Allowed CORS origins. Required unless cors_permissive is true.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    #[serde(default)]
    pub cors_permissive: bool,
}

/// Transport backend REST API (routes, stops, drivers, cadets)
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "BackendConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    fn default_timeout_secs() -> u64 {
        30
    }
}

/// OSRM-compatible routing service used for route geometry
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "RoutingConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "RoutingConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl RoutingConfig {
    fn default_base_url() -> String {
        "https://router.project-osrm.org".to_string()
    }
    fn default_timeout_secs() -> u64 {
        30
    }
}

/// Configuration for the backend refresh loop
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Interval in seconds between backend refresh cycles (default: 60)
    #[serde(default = "SyncConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Retries for the initial backend load before serving empty stores (default: 3)
    #[serde(default = "SyncConfig::default_initial_load_retries")]
    pub initial_load_retries: u32,
    /// Initial delay in milliseconds for the initial-load backoff (default: 1000)
    #[serde(default = "SyncConfig::default_initial_load_delay_ms")]
    pub initial_load_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: Self::default_interval_secs(),
            initial_load_retries: Self::default_initial_load_retries(),
            initial_load_delay_ms: Self::default_initial_load_delay_ms(),
        }
    }
}

impl SyncConfig {
    fn default_interval_secs() -> u64 {
        60
    }
    fn default_initial_load_retries() -> u32 {
        3
    }
    fn default_initial_load_delay_ms() -> u64 {
        1000
    }

    pub fn validate(&self) {
        if self.interval_secs == 0 {
            panic!("sync.interval_secs must be greater than zero");
        }
    }
}

impl Config {
    fn default_average_speed_kmh() -> f64 {
        crate::geo::DEFAULT_AVERAGE_SPEED_KMH
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}
