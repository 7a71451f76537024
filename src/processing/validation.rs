//! Per-file limits checked before and after decoding

use std::path::Path;

use tracing::debug;

use crate::config::ProcessingConfig;
use crate::error::{BatchScaleError, Result};

/// Image validator for checking file limits
#[derive(Debug, Clone)]
pub struct ImageValidator {
    max_file_size: u64,
    max_dimension: u32,
}

impl ImageValidator {
    /// Create a new image validator with default limits
    pub fn new() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }

    /// Create a validator with custom limits
    pub fn with_limits(max_file_size: u64, max_dimension: u32) -> Self {
        Self {
            max_file_size,
            max_dimension,
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::with_limits(config.max_file_size, config.max_dimension)
    }

    /// Check that `path` is a regular file within the size limit.
    ///
    /// Returns the file size so callers can pick a read strategy.
    pub fn validate_file(&self, path: &Path) -> Result<u64> {
        let metadata =
            std::fs::metadata(path).map_err(|e| BatchScaleError::read(path.to_path_buf(), e))?;

        if !metadata.is_file() {
            return Err(BatchScaleError::validation(
                "Path is not a regular file",
                Some(path.to_path_buf()),
            ));
        }

        let file_size = metadata.len();
        if file_size > self.max_file_size {
            return Err(BatchScaleError::validation(
                format!(
                    "File too large: {} bytes (limit: {} bytes)",
                    file_size, self.max_file_size
                ),
                Some(path.to_path_buf()),
            ));
        }

        debug!("Validated {:?} ({} bytes)", path, file_size);
        Ok(file_size)
    }

    /// Check decoded dimensions against the configured limit
    pub fn validate_dimensions(&self, width: u32, height: u32, path: Option<&Path>) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(BatchScaleError::validation(
                format!("Image has empty dimensions {}x{}", width, height),
                path.map(Path::to_path_buf),
            ));
        }

        if width > self.max_dimension || height > self.max_dimension {
            return Err(BatchScaleError::validation(
                format!(
                    "Image too large: {}x{} (limit: {} per side)",
                    width, height, self.max_dimension
                ),
                path.map(Path::to_path_buf),
            ));
        }

        Ok(())
    }
}

impl Default for ImageValidator {
    fn default() -> Self {
        Self::new()
    }
}
