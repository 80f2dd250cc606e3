use std::io;
use std::path::PathBuf;

/// A config file that exists but could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Failures of the persisted power/temperature store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("stored timestamp {0} ms is out of range")]
    InvalidTimestamp(i64),
}

/// Failures reported by a hardware sensor backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error("sensor backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read sensor `{sensor}`: {reason}")]
    Read { sensor: String, reason: String },
}

impl SensorError {
    pub(crate) fn unavailable<S: Into<String>>(msg: S) -> Self {
        SensorError::Unavailable(msg.into())
    }

    pub(crate) fn read<S: Into<String>, R: Into<String>>(sensor: S, reason: R) -> Self {
        SensorError::Read {
            sensor: sensor.into(),
            reason: reason.into(),
        }
    }
}

/// Faults raised inside a sampler tick.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("OS metrics source failed: {0}")]
    Source(String),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error("snapshot consumer disconnected")]
    ConsumerGone,

    #[error("failed to spawn sampler thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("sampler thread panicked")]
    Panicked,
}

impl SamplerError {
    pub(crate) fn source<S: Into<String>>(msg: S) -> Self {
        SamplerError::Source(msg.into())
    }
}
