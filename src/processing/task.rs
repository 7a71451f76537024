//! One source file through decode, resize, encode and atomic write

use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use memmap2::{Mmap, MmapOptions};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ProcessingConfig;
use crate::error::{BatchScaleError, ErrorContext, ErrorKind, Result};
use crate::parallel::CancellationToken;
use crate::processing::codec::ImageCodec;
use crate::processing::formats::output_path_for;
use crate::processing::resize::{scaled_dimensions, validate_scale, FilterType};
use crate::processing::validation::ImageValidator;

/// A single unit of batch work
#[derive(Debug, Clone, PartialEq)]
pub struct ImageJob {
    source: PathBuf,
    scale: f64,
}

impl ImageJob {
    pub fn new<P: Into<PathBuf>>(source: P, scale: f64) -> Self {
        Self {
            source: source.into(),
            scale,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

/// Why a job failed, as recorded in the batch report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&BatchScaleError> for JobFailure {
    fn from(error: &BatchScaleError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Final state of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded {
        output: PathBuf,
        width: u32,
        height: u32,
        bytes_written: u64,
    },
    Failed(JobFailure),
    /// Skipped because the batch was cancelled before the job wrote anything
    Cancelled,
}

/// Outcome of one [`ImageJob`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub source: PathBuf,
    pub outcome: JobOutcome,
    #[serde(skip)]
    pub processing_time: Duration,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded { .. })
    }
}

/// Source bytes, either read into memory or mapped for large files
enum SourceBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for SourceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Owned(bytes) => bytes,
            Self::Mapped(map) => map,
        }
    }
}

/// Runs the per-file pipeline against a shared codec
pub struct ResizeTask<C: ImageCodec> {
    codec: Arc<C>,
    dest_dir: PathBuf,
    quality: u8,
    filter: FilterType,
    mmap_threshold: u64,
    validator: ImageValidator,
}

impl<C: ImageCodec> ResizeTask<C> {
    pub fn new(codec: Arc<C>, dest_dir: PathBuf, config: &ProcessingConfig) -> Self {
        Self {
            codec,
            dest_dir,
            quality: config.quality,
            filter: config.filter,
            mmap_threshold: config.mmap_threshold,
            validator: ImageValidator::from_config(config),
        }
    }

    /// Process one job. Every error is captured in the returned result.
    pub fn process(&self, job: &ImageJob, cancel: &CancellationToken) -> JobResult {
        let start = Instant::now();

        let outcome = match self.run(job, cancel) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("Failed to process {:?}: {}", job.source(), error);
                JobOutcome::Failed(JobFailure::from(&error))
            }
        };

        JobResult {
            source: job.source.clone(),
            outcome,
            processing_time: start.elapsed(),
        }
    }

    fn run(&self, job: &ImageJob, cancel: &CancellationToken) -> Result<JobOutcome> {
        let source = job.source();

        // Before anything touches the codec
        validate_scale(job.scale()).with_file_context(source.to_path_buf())?;
        let output = output_path_for(source, &self.dest_dir)?;

        if cancel.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }

        let file_size = self.validator.validate_file(source)?;
        let bytes = self.read_source(source, file_size)?;
        let raster = self
            .codec
            .decode(&bytes)
            .map_err(|e| BatchScaleError::decode(source.to_path_buf(), e))?;
        drop(bytes);

        let (width, height) = self.codec.dimensions(&raster);
        self.validator.validate_dimensions(width, height, Some(source))?;

        let (dest_width, dest_height) =
            scaled_dimensions(width, height, job.scale()).with_file_context(source.to_path_buf())?;
        debug!(
            "Resizing {:?} {}x{} -> {}x{} using {:?}",
            source, width, height, dest_width, dest_height, self.filter
        );

        let resized = self
            .codec
            .resize(raster, dest_width, dest_height, self.filter)
            .map_err(|e| BatchScaleError::resize(source.to_path_buf(), e))?;

        let encoded = self
            .codec
            .encode_jpeg(&resized, self.quality)
            .map_err(|e| BatchScaleError::encode(source.to_path_buf(), e))?;
        drop(resized);

        if cancel.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }

        self.write_atomic(&output, &encoded)?;
        debug!("Wrote {:?} ({} bytes)", output, encoded.len());

        Ok(JobOutcome::Succeeded {
            output,
            width: dest_width,
            height: dest_height,
            bytes_written: encoded.len() as u64,
        })
    }

    fn read_source(&self, path: &Path, file_size: u64) -> Result<SourceBytes> {
        let read_err = |e: std::io::Error| BatchScaleError::read(path.to_path_buf(), e);

        if file_size > self.mmap_threshold {
            debug!("Using memory mapping for large file: {:?}", path);
            let file = std::fs::File::open(path).map_err(read_err)?;
            // The mapping is read-only and dropped before the job returns
            let map = unsafe { MmapOptions::new().map(&file) }.map_err(read_err)?;
            return Ok(SourceBytes::Mapped(map));
        }

        std::fs::read(path).map(SourceBytes::Owned).map_err(read_err)
    }

    /// Write through a temp file in the destination and rename into place.
    /// A reader never observes a partially written output.
    fn write_atomic(&self, output: &Path, bytes: &[u8]) -> Result<()> {
        let write_err = |e: std::io::Error| BatchScaleError::write(output.to_path_buf(), e);

        let mut temp = tempfile::Builder::new()
            .prefix(".batchscale-")
            .suffix(".part")
            .tempfile_in(&self.dest_dir)
            .map_err(write_err)?;

        temp.write_all(bytes).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(output).map_err(|e| write_err(e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::codec::testing::{CountingCodec, FailingResizeCodec};
    use crate::processing::codec::ImageCrateCodec;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8])
        });
        img.save(path).unwrap();
    }

    fn task_for<C: ImageCodec>(codec: C, dest: &Path) -> ResizeTask<C> {
        ResizeTask::new(Arc::new(codec), dest.to_path_buf(), &ProcessingConfig::default())
    }

    fn failure_kind(result: &JobResult) -> Option<ErrorKind> {
        match &result.outcome {
            JobOutcome::Failed(failure) => Some(failure.kind),
            _ => None,
        }
    }

    #[test]
    fn test_png_is_scaled_to_jpeg() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("portrait.png");
        write_png(&input, 100, 200);

        let task = task_for(ImageCrateCodec, dest.path());
        let result = task.process(&ImageJob::new(&input, 0.5), &CancellationToken::new());

        let expected = dest.path().join("portrait.jpg");
        match &result.outcome {
            JobOutcome::Succeeded { output, width, height, bytes_written } => {
                assert_eq!(output, &expected);
                assert_eq!((*width, *height), (50, 100));
                assert_eq!(*bytes_written, std::fs::metadata(&expected).unwrap().len());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(image::image_dimensions(&expected).unwrap(), (50, 100));
    }

    #[test]
    fn test_reprocessing_is_dimension_stable() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("odd.png");
        write_png(&input, 333, 77);

        let task = task_for(ImageCrateCodec, dest.path());
        let output = dest.path().join("odd.jpg");

        task.process(&ImageJob::new(&input, 0.3), &CancellationToken::new());
        let first = image::image_dimensions(&output).unwrap();
        task.process(&ImageJob::new(&input, 0.3), &CancellationToken::new());
        let second = image::image_dimensions(&output).unwrap();

        assert_eq!(first, (99, 23));
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_positive_scale_skips_codec() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("a.png");
        write_png(&input, 10, 10);

        let task = task_for(CountingCodec::default(), dest.path());
        for scale in [0.0, -0.5] {
            let result = task.process(&ImageJob::new(&input, scale), &CancellationToken::new());
            assert_eq!(failure_kind(&result), Some(ErrorKind::Validation));
        }

        assert_eq!(task.codec.calls(), 0);
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_too_small_result_is_validation_error() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("tiny.png");
        write_png(&input, 3, 3);

        let task = task_for(ImageCrateCodec, dest.path());
        let result = task.process(&ImageJob::new(&input, 0.2), &CancellationToken::new());

        assert_eq!(failure_kind(&result), Some(ErrorKind::Validation));
        assert!(!dest.path().join("tiny.jpg").exists());
    }

    #[test]
    fn test_corrupt_file_is_decode_error() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("broken.jpg");
        std::fs::write(&input, b"this is not a jpeg").unwrap();

        let task = task_for(ImageCrateCodec, dest.path());
        let result = task.process(&ImageJob::new(&input, 0.5), &CancellationToken::new());

        assert_eq!(failure_kind(&result), Some(ErrorKind::Decode));
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_resize_failure_is_reported() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("a.png");
        write_png(&input, 20, 20);

        let task = task_for(FailingResizeCodec, dest.path());
        let result = task.process(&ImageJob::new(&input, 0.5), &CancellationToken::new());

        assert_eq!(failure_kind(&result), Some(ErrorKind::Resize));
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_destination_is_write_error() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("a.png");
        write_png(&input, 20, 20);

        let gone = dest.path().join("removed");
        let task = task_for(ImageCrateCodec, &gone);
        let result = task.process(&ImageJob::new(&input, 0.5), &CancellationToken::new());

        assert_eq!(failure_kind(&result), Some(ErrorKind::Write));
    }

    #[test]
    fn test_cancelled_before_start() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("a.png");
        write_png(&input, 20, 20);

        let token = CancellationToken::new();
        token.cancel();

        let task = task_for(CountingCodec::default(), dest.path());
        let result = task.process(&ImageJob::new(&input, 0.5), &token);

        assert_eq!(result.outcome, JobOutcome::Cancelled);
        assert_eq!(task.codec.calls(), 0);
    }

    #[test]
    fn test_large_files_are_memory_mapped() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let input = src.path().join("mapped.png");
        write_png(&input, 64, 32);

        let config = ProcessingConfig {
            mmap_threshold: 0,
            ..ProcessingConfig::default()
        };
        let task = ResizeTask::new(Arc::new(ImageCrateCodec), dest.path().to_path_buf(), &config);
        let result = task.process(&ImageJob::new(&input, 0.25), &CancellationToken::new());

        assert!(result.is_success());
        assert_eq!(
            image::image_dimensions(dest.path().join("mapped.jpg")).unwrap(),
            (16, 8)
        );
    }
}
