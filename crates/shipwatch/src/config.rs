use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::correction::CorrectionMode;
use crate::error::ConfigError;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::tailer::{TailOptions, DEFAULT_MAX_LINE_BYTES, DEFAULT_POLL_INTERVAL};

/// Settings for a [`crate::ShipWatch`] service.
///
/// Usually read from a TOML file:
///
/// ```toml
/// log_path = "/games/StarCitizen/LIVE/Game.log"
/// signatures_path = "shiptypes.txt"
/// poll_interval_ms = 100
/// queue_capacity = 256
/// correction_mode = "strict"
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShipWatchConfig {
    /// Log file to follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    /// Persisted signature library.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    #[serde(default)]
    pub correction_mode: CorrectionMode,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

impl Default for ShipWatchConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            signatures_path: None,
            poll_interval_ms: default_poll_interval_ms(),
            queue_capacity: default_queue_capacity(),
            max_line_bytes: default_max_line_bytes(),
            correction_mode: CorrectionMode::default(),
        }
    }
}

impl ShipWatchConfig {
    pub fn new(log_path: impl Into<PathBuf>, signatures_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: Some(log_path.into()),
            signatures_path: Some(signatures_path.into()),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Checks required fields and limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_path.is_none() {
            return Err(ConfigError::Missing { field: "log_path" });
        }
        if self.signatures_path.is_none() {
            return Err(ConfigError::Missing {
                field: "signatures_path",
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_capacity",
                reason: "must be greater than zero",
            });
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_line_bytes",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tail_options(&self) -> TailOptions {
        TailOptions {
            poll_interval: self.poll_interval(),
            max_line_bytes: self.max_line_bytes,
        }
    }
}
