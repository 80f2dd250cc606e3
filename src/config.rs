use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerSection,
    pub store: StoreSection,
    pub display: DisplayConfig,
    pub report: ReportSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplerSection {
    pub interval_ms: u64,
    pub log_interval_secs: u64,
    pub fault_backoff_ms: u64,
    pub hardware_sensors: bool,
}

impl Default for SamplerSection {
    fn default() -> Self {
        SamplerSection {
            interval_ms: 1000,
            log_interval_secs: 60,
            fault_backoff_ms: 1000,
            hardware_sensors: true,
        }
    }
}

impl SamplerSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_secs)
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_millis(self.fault_backoff_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
    pub retention_days: u32,
    pub prune_interval_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            path: None,
            retention_days: 90,
            prune_interval_secs: 3600,
        }
    }
}

impl StoreSection {
    /// Configured database path, or the per-user data directory default.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(default_db_path)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 24 * 3600)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_cpu: bool,
    pub show_ram: bool,
    pub show_gpu: bool,
    pub show_net: bool,
    pub show_power: bool,
    pub show_temp: bool,
    /// Append a CPU sparkline to the CPU indicator.
    pub graph: bool,
    pub ram_unit: String,
    pub net_unit: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            show_cpu: true,
            show_ram: true,
            show_gpu: true,
            show_net: true,
            show_power: true,
            show_temp: true,
            graph: false,
            ram_unit: "GB".to_string(),
            net_unit: "kbps".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub rate_per_kwh: f64,
    pub currency: String,
    pub currency_symbol: String,
}

impl Default for ReportSection {
    fn default() -> Self {
        ReportSection {
            rate_per_kwh: 8.0,
            currency: "BDT".to_string(),
            currency_symbol: "৳".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            filter: "info".to_string(),
            json: false,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sysmonbar").join("config.toml"))
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("sysmonbar").join("power_data.db"))
}

/// Load from the default location. A missing file yields the defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Ok(Config::default()),
    }
}

pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `path` (or the default location), falling back to defaults on error.
/// The error is handed back so it can be reported once logging is up.
pub fn load_or_default(path: Option<&Path>) -> (Config, Option<ConfigError>) {
    let loaded = match path {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    }
}
