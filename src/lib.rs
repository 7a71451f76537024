//! BatchScale - Concurrent Batch Image Rescaler
//!
//! Walks a directory tree, scales every PNG and JPEG by a uniform factor and
//! re-encodes the result as JPEG into a single flat destination directory.
//!
//! # Features
//!
//! - **Bounded Parallelism**: A fixed-size worker pool, one job per file
//! - **Isolated Failures**: A bad file is recorded in the report, the batch continues
//! - **Atomic Output**: Files appear in the destination fully written or not at all
//! - **Cooperative Cancellation**: Stop a running batch without partial files
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use batchscale::resize_all;
//!
//! let report = resize_all("photos", "thumbnails", 0.25)?;
//! println!("{}", report);
//!
//! for (path, failure) in report.failures() {
//!     eprintln!("{:?}: {}", path, failure.message);
//! }
//! # Ok::<(), batchscale::BatchScaleError>(())
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod filesystem;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use config::{Config, LoggingConfig, OutputConfig, ProcessingConfig};
pub use error::{BatchScaleError, ErrorKind, Result};
pub use filesystem::{DestinationManager, FileScanner};
pub use parallel::{BatchReport, BatchScheduler, CancellationToken, ProgressUpdate};
pub use processing::{FilterType, ImageCodec, ImageCrateCodec, JobOutcome};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install a global `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init() -> Result<()> {
    if tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .is_ok()
    {
        info!("BatchScale v{} initialized", VERSION);
    }

    Ok(())
}

/// Initialize with custom configuration
pub fn init_with_config(config: &Config) -> Result<()> {
    config.validate()?;

    let filter = EnvFilter::try_new(&config.logging.level).map_err(|e| {
        BatchScaleError::config(format!(
            "Invalid log level {:?}: {}",
            config.logging.level, e
        ))
    })?;

    let installed = if config.logging.json_format {
        tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .json()
                .finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            FmtSubscriber::builder().with_env_filter(filter).finish(),
        )
    };

    if installed.is_ok() {
        info!("BatchScale v{} initialized with custom config", VERSION);
    }

    Ok(())
}

/// Scale every image under `source` into `dest` with default settings
pub fn resize_all<P, Q>(source: P, dest: Q, scale: f64) -> Result<BatchReport>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    Resizer::new()?.run(source, dest, scale, &CancellationToken::new())
}

/// Async form of [`resize_all`]; the work runs on tokio's blocking pool
pub async fn resize_all_async<P, Q>(source: P, dest: Q, scale: f64) -> Result<BatchReport>
where
    P: Into<PathBuf>,
    Q: Into<PathBuf>,
{
    let scheduler = Arc::new(BatchScheduler::new(ProcessingConfig::default())?);
    scheduler
        .run_batch_async(source.into(), dest.into(), scale, CancellationToken::new())
        .await
}

/// Remove every file under `dest`, creating it if missing. Returns the count removed.
pub fn clean<P: Into<PathBuf>>(dest: P) -> Result<usize> {
    DestinationManager::new(dest).clean()
}

/// All PNG and JPEG files under `source`, at any depth
pub fn find_images<P: AsRef<Path>>(source: P) -> Result<Vec<PathBuf>> {
    FileScanner::new().scan(source)
}

/// A configured scheduler plus destination policy
#[derive(Clone)]
pub struct Resizer {
    config: Config,
    scheduler: Arc<BatchScheduler>,
}

impl Resizer {
    pub fn new() -> Result<Self> {
        Self::from_config(Config::default())
    }

    /// Validate `config` and build the worker pool it describes
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let scheduler = BatchScheduler::new(config.processing.clone())?;

        Ok(Self {
            config,
            scheduler: Arc::new(scheduler),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.scheduler.subscribe()
    }

    /// Run one batch, cleaning the destination first when configured to
    pub fn run<P, Q>(
        &self,
        source: P,
        dest: Q,
        scale: f64,
        cancel: &CancellationToken,
    ) -> Result<BatchReport>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        if self.config.output.clean_before_run {
            let removed = DestinationManager::new(dest.as_ref()).clean()?;
            info!("Cleaned {} file(s) from {:?}", removed, dest.as_ref());
        }

        self.scheduler.run_batch(source, dest, scale, cancel)
    }

    /// [`Resizer::run`] on tokio's blocking pool
    pub async fn run_async(
        &self,
        source: PathBuf,
        dest: PathBuf,
        scale: f64,
        cancel: CancellationToken,
    ) -> Result<BatchReport> {
        let resizer = self.clone();
        tokio::task::spawn_blocking(move || resizer.run(&source, &dest, scale, &cancel))
            .await
            .map_err(|e| BatchScaleError::internal(format!("batch task failed: {}", e), None))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 255) as u8, (y % 255) as u8, 40])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_init() {
        // Should not fail on multiple calls
        assert!(init().is_ok());
        assert!(init().is_ok());
        assert!(init_with_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let mut config = Config::default();
        config.processing.quality = 0;
        assert_eq!(init_with_config(&config).unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_resize_all_end_to_end() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write_png(&src.path().join("portrait.png"), 100, 200);

        let report = resize_all(src.path(), dest.path(), 0.5).unwrap();

        let expected = dest.path().join("portrait.jpg");
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.outputs().collect::<Vec<_>>(), vec![expected.as_path()]);
        assert_eq!(image::image_dimensions(&expected).unwrap(), (50, 100));
    }

    #[tokio::test]
    async fn test_resize_all_async() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write_png(&src.path().join("a.png"), 30, 10);

        let report = resize_all_async(src.path(), dest.path(), 2.0).await.unwrap();

        assert_eq!(report.succeeded(), 1);
        assert_eq!(
            image::image_dimensions(dest.path().join("a.jpg")).unwrap(),
            (60, 20)
        );
    }

    #[test]
    fn test_find_images_and_clean() {
        let dir = TempDir::new().unwrap();
        for name in ["a.png", "b.jpg", "c.jpeg", "d.txt", "e.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        assert_eq!(find_images(dir.path()).unwrap().len(), 3);
        assert_eq!(clean(dir.path()).unwrap(), 5);
        assert!(find_images(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_clean_before_run_removes_stale_outputs() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write_png(&src.path().join("fresh.png"), 20, 20);
        std::fs::write(dest.path().join("stale.jpg"), b"old").unwrap();

        let mut config = Config::default();
        config.processing.workers = Some(1);
        config.output.clean_before_run = true;
        let resizer = Resizer::from_config(config).unwrap();

        let report = resizer
            .run(src.path(), dest.path(), 0.5, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.succeeded(), 1);
        assert!(!dest.path().join("stale.jpg").exists());
        assert!(dest.path().join("fresh.jpg").exists());
    }

    #[test]
    fn test_default_resizer_keeps_existing_files() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write_png(&src.path().join("fresh.png"), 20, 20);
        std::fs::write(dest.path().join("stale.jpg"), b"old").unwrap();

        Resizer::new()
            .unwrap()
            .run(src.path(), dest.path(), 0.5, &CancellationToken::new())
            .unwrap();

        assert!(dest.path().join("stale.jpg").exists());
    }

    #[tokio::test]
    async fn test_resizer_run_async() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write_png(&src.path().join("x.png"), 10, 10);

        let resizer = Resizer::new().unwrap();
        let report = resizer
            .run_async(
                src.path().to_path_buf(),
                dest.path().to_path_buf(),
                0.5,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 1);
    }
}
