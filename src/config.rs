use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::fingerprint::{MAX_RESOLUTION, MIN_RESOLUTION};
use crate::core::{DEFAULT_RESOLUTION, DEFAULT_THRESHOLD, FingerprintError};

const APP_DIR: &str = "pxlproof";
const CONFIG_FILE: &str = "config.json";
const LEDGER_FILE: &str = "ledger.jsonl";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] FingerprintError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resolution: u32,
    pub threshold: f64,
    pub ledger_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            threshold: DEFAULT_THRESHOLD,
            ledger_path: default_ledger_path(),
        }
    }
}

impl Config {
    /// Load from `path`, or the default location when `None`.
    /// A file that does not exist yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config: Config =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&self.resolution) {
            return Err(FingerprintError::InvalidConfiguration {
                message: format!(
                    "resolution must be between {} and {}, got {}",
                    MIN_RESOLUTION, MAX_RESOLUTION, self.resolution
                ),
            }
            .into());
        }
        if !self.threshold.is_finite() || !(0.0..=100.0).contains(&self.threshold) {
            return Err(FingerprintError::InvalidConfiguration {
                message: format!("threshold must be within [0, 100], got {}", self.threshold),
            }
            .into());
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    base_dir(dirs::config_dir()).join(CONFIG_FILE)
}

pub fn default_ledger_path() -> PathBuf {
    base_dir(dirs::data_dir()).join(LEDGER_FILE)
}

fn base_dir(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}
