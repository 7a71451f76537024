//! Destination directory preparation and cleanup

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{BatchScaleError, CleanFailure, Result};

/// Owns the lifecycle of the output directory
#[derive(Debug, Clone)]
pub struct DestinationManager {
    root: PathBuf,
}

impl DestinationManager {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory and its parents if absent
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Remove every file under the root, leaving directories in place.
    ///
    /// A missing root is created empty; a root that exists but is not a
    /// directory is a `CleanError`. Individual failures do not stop the
    /// sweep; they are reported together once it finishes. Returns the number
    /// of files removed.
    pub fn clean(&self) -> Result<usize> {
        self.clean_with(|path| std::fs::remove_file(path))
    }

    fn clean_with<F>(&self, mut remove: F) -> Result<usize>
    where
        F: FnMut(&Path) -> std::io::Result<()>,
    {
        if !self.root.is_dir() {
            std::fs::create_dir_all(&self.root).map_err(|error| {
                self.clean_error(vec![CleanFailure {
                    path: self.root.clone(),
                    error,
                }])
            })?;
            debug!("Created empty destination {:?}", self.root);
            return Ok(0);
        }

        let mut removed = 0;
        let mut failures = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).follow_links(false) {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {}
                Ok(entry) => match remove(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(error) => {
                        warn!("Could not remove {:?}: {}", entry.path(), error);
                        failures.push(CleanFailure {
                            path: entry.into_path(),
                            error,
                        });
                    }
                },
                Err(e) => {
                    let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                    warn!("Could not read {:?} while cleaning: {}", path, e);
                    failures.push(CleanFailure {
                        path,
                        error: e.into(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            info!(
                "Removed {} file(s) from {:?}, {} could not be removed",
                removed,
                self.root,
                failures.len()
            );
            return Err(self.clean_error(failures));
        }

        info!("Removed {} file(s) from {:?}", removed, self.root);
        Ok(removed)
    }

    fn clean_error(&self, failures: Vec<CleanFailure>) -> BatchScaleError {
        BatchScaleError::CleanError {
            path: self.root.clone(),
            failures,
        }
    }
}
