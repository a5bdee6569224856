use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;
use xdes::storage::page::{is_supported_page_size, DEFAULT_PAGE_SIZE};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Settings after merging defaults, the config file and command-line flags.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InspectConfig {
    pub page_size: usize,
    pub format: OutputFormat,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            format: OutputFormat::Text,
        }
    }
}

impl InspectConfig {
    /// Loads `explicit` (which must exist) or the default config file if present.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let raw = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Missing { path });
                }
                read_file(&path)?
            }
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => RawConfig::default(),
            },
        };
        let defaults = Self::default();
        let config = Self {
            page_size: raw.page_size.unwrap_or(defaults.page_size),
            format: raw.format.unwrap_or(defaults.format),
        };
        config.validate()
    }

    /// Applies command-line overrides.
    pub fn with_overrides(
        mut self,
        page_size: Option<usize>,
        format: Option<OutputFormat>,
    ) -> Result<Self, ConfigError> {
        if let Some(page_size) = page_size {
            self.page_size = page_size;
        }
        if let Some(format) = format {
            self.format = format;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if !is_supported_page_size(self.page_size) {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }
        Ok(self)
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    page_size: Option<usize>,
    format: Option<OutputFormat>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read inspector config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse inspector config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("inspector config {path} does not exist")]
    Missing { path: PathBuf },
    #[error("page size {value} is not supported (expected 16384, 32768 or 65536)")]
    InvalidPageSize { value: usize },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("xdes").join("inspect.toml"))
}
