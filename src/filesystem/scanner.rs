//! Source tree discovery

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{BatchScaleError, Result};
use crate::processing::formats::has_supported_extension;

/// Recursively finds PNG and JPEG files under a source directory
#[derive(Debug, Clone, Default)]
pub struct FileScanner {
    excluded: Vec<PathBuf>,
}

impl FileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never descend into `dir`, typically the destination when it is
    /// nested under the source.
    pub fn exclude<P: AsRef<Path>>(mut self, dir: P) -> Self {
        let dir = dir.as_ref();
        self.excluded
            .push(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
        self
    }

    /// List candidate images in file-name order.
    ///
    /// Symlinks are not followed. Entries that cannot be read are logged and
    /// skipped.
    pub fn scan<P: AsRef<Path>>(&self, source: P) -> Result<Vec<PathBuf>> {
        let source = source.as_ref();
        if !source.is_dir() {
            return Err(BatchScaleError::not_found(source));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(source)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && has_supported_extension(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!("Skipping unreadable entry under {:?}: {}", source, e),
            }
        }

        debug!("Found {} image(s) under {:?}", files.len(), source);
        Ok(files)
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        // The root itself is always walked
        if entry.depth() == 0 || !entry.file_type().is_dir() || self.excluded.is_empty() {
            return false;
        }

        let path = entry.path();
        let canonical = path.canonicalize().ok();
        self.excluded
            .iter()
            .any(|dir| dir == path || canonical.as_deref() == Some(dir.as_path()))
    }
}
