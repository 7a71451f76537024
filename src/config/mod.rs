//! Configuration management for BatchScale

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BatchScaleError, Result};
use crate::processing::FilterType;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool and per-file processing settings
    pub processing: ProcessingConfig,

    /// Destination handling
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Worker pool and per-file processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of worker threads (None = one per logical CPU)
    pub workers: Option<usize>,

    /// JPEG quality of the re-encoded output (1-100)
    pub quality: u8,

    /// Resampling filter used when scaling
    pub filter: FilterType,

    /// Maximum source file size to process (in bytes)
    pub max_file_size: u64,

    /// Maximum width or height of a decoded source image
    pub max_dimension: u32,

    /// Sources larger than this are memory-mapped instead of read (in bytes)
    pub mmap_threshold: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: None,
            quality: 100,
            filter: FilterType::default(),
            max_file_size: 500 * 1024 * 1024, // 500MB
            max_dimension: 65_535,
            mmap_threshold: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl ProcessingConfig {
    /// Worker count after resolving auto-detection
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Destination directory configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Remove every file under the destination before a batch starts
    pub clean_before_run: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            BatchScaleError::config(format!(
                "Failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        let config: Self = match extension_of(path.as_ref()).as_str() {
            "toml" => toml::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            _ => {
                return Err(BatchScaleError::config(
                    "Unsupported config file format. Use .toml or .yaml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = match extension_of(path.as_ref()).as_str() {
            "toml" => toml::to_string_pretty(self).map_err(|e| {
                BatchScaleError::config(format!("TOML serialization failed: {}", e))
            })?,
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            _ => {
                return Err(BatchScaleError::config(
                    "Unsupported config file format. Use .toml or .yaml",
                ))
            }
        };

        std::fs::write(&path, content).map_err(|e| {
            BatchScaleError::config(format!(
                "Failed to write config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.processing.workers == Some(0) {
            return Err(BatchScaleError::config(
                "Worker count must be greater than 0",
            ));
        }

        if self.processing.quality == 0 || self.processing.quality > 100 {
            return Err(BatchScaleError::config(format!(
                "Quality must be between 1 and 100, got {}",
                self.processing.quality
            )));
        }

        if self.processing.max_file_size == 0 || self.processing.max_dimension == 0 {
            return Err(BatchScaleError::config(
                "File size and dimension limits must be greater than 0",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(BatchScaleError::config("Log level must not be empty"));
        }

        Ok(())
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}
