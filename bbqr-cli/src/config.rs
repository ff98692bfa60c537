//! Configuration file loading.
//!
//! Lookup order: `--config PATH`, then `bbqr.toml` in the working directory,
//! then built-in defaults. Command-line flags override whatever is loaded.

use std::path::{Path, PathBuf};

use bbqr_protocol::{DecoderConfig, EncoderConfig};
use serde::Deserialize;
use thiserror::Error;

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "bbqr.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<PathBuf>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the explicit config, or the default file if it exists, or defaults.
///
/// Returns the path that was actually loaded alongside the config.
pub fn resolve_config(
    explicit: Option<&Path>,
) -> Result<(ConfigFile, Option<PathBuf>), ConfigError> {
    let path = explicit.map(Path::to_path_buf).or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_path.exists().then_some(default_path)
    });

    match path {
        Some(path) => Ok((load_config(&path)?, Some(path))),
        None => Ok((ConfigFile::default(), None)),
    }
}
