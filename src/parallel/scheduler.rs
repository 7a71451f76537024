//! Bounded worker pool dispatching one resize task per source file

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::ProcessingConfig;
use crate::error::{BatchScaleError, Result};
use crate::filesystem::{DestinationManager, FileScanner};
use crate::parallel::cancel::CancellationToken;
use crate::parallel::progress::{ProgressTracker, ProgressUpdate};
use crate::parallel::report::BatchReport;
use crate::processing::{
    ImageCodec, ImageCrateCodec, ImageJob, JobFailure, JobOutcome, JobResult, ResizeTask,
};

/// Runs batches on a fixed-size `rayon` pool.
///
/// Workers never share state with each other. Each sends its [`JobResult`]
/// over a channel to the calling thread, which is the only writer of the
/// [`BatchReport`] and the only source of progress events.
pub struct BatchScheduler<C: ImageCodec = ImageCrateCodec> {
    codec: Arc<C>,
    config: ProcessingConfig,
    pool: rayon::ThreadPool,
    progress: ProgressTracker,
}

impl BatchScheduler<ImageCrateCodec> {
    pub fn new(config: ProcessingConfig) -> Result<Self> {
        Self::with_codec(ImageCrateCodec, config)
    }
}

impl<C: ImageCodec> BatchScheduler<C> {
    /// Build a scheduler around a custom codec
    pub fn with_codec(codec: C, config: ProcessingConfig) -> Result<Self> {
        let workers = config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("batchscale-worker-{}", i))
            .build()
            .map_err(|e| BatchScaleError::pool(e.to_string()))?;

        info!("Initialized batch scheduler with {} workers", workers);

        Ok(Self {
            codec: Arc::new(codec),
            config,
            pool,
            progress: ProgressTracker::new(),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Subscribe to progress events for every batch run after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.progress.subscribe()
    }

    /// Scale every PNG and JPEG under `source` into `dest`.
    ///
    /// The destination is created if needed but never cleaned here. Per-file
    /// failures land in the report; only batch-level problems are returned
    /// as errors.
    pub fn run_batch<P, Q>(
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
        let (source, dest) = (source.as_ref(), dest.as_ref());

        DestinationManager::new(dest).ensure()?;
        let jobs: Vec<ImageJob> = FileScanner::new()
            .exclude(dest)
            .scan(source)?
            .into_iter()
            .map(|path| ImageJob::new(path, scale))
            .collect();

        info!(
            "Scaling {} images from {:?} into {:?} by {}",
            jobs.len(),
            source,
            dest,
            scale
        );

        Ok(self.run_jobs(jobs, dest, cancel))
    }

    /// Dispatch prepared jobs and collect exactly one result per job
    pub fn run_jobs(&self, jobs: Vec<ImageJob>, dest: &Path, cancel: &CancellationToken) -> BatchReport {
        let started = Instant::now();
        let task = ResizeTask::new(Arc::clone(&self.codec), dest.to_path_buf(), &self.config);
        let task = &task;

        let mut report = BatchReport::new();
        let mut progress = self.progress.start(jobs.len());
        let (result_tx, result_rx) = channel::unbounded::<JobResult>();

        self.pool.in_place_scope(|scope| {
            for job in jobs {
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    // The receiver outlives every worker
                    let _ = result_tx.send(process_guarded(task, &job, cancel));
                });
            }
            drop(result_tx);

            for result in result_rx.iter() {
                progress.record(&result);
                report.insert(result);
            }
        });

        report.elapsed = started.elapsed();
        report.cancelled = cancel.is_cancelled();
        progress.finish();

        if report.cancelled {
            info!(
                "Batch cancelled after {} of {} jobs",
                report.succeeded() + report.failed(),
                report.len()
            );
        }
        report
    }

    /// Run a batch on tokio's blocking pool
    pub async fn run_batch_async(
        self: Arc<Self>,
        source: PathBuf,
        dest: PathBuf,
        scale: f64,
        cancel: CancellationToken,
    ) -> Result<BatchReport>
    where
        C: 'static,
    {
        tokio::task::spawn_blocking(move || self.run_batch(&source, &dest, scale, &cancel))
            .await
            .map_err(|e| BatchScaleError::internal(format!("batch task failed: {}", e), None))?
    }
}

/// A panicking job becomes an `Internal` failure instead of tearing down the batch
fn process_guarded<C: ImageCodec>(
    task: &ResizeTask<C>,
    job: &ImageJob,
    cancel: &CancellationToken,
) -> JobResult {
    let start = Instant::now();
    debug!("Dispatching {:?}", job.source());

    match panic::catch_unwind(AssertUnwindSafe(|| task.process(job, cancel))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Worker panicked on {:?}: {}", job.source(), message);

            let error = BatchScaleError::internal(
                format!("worker panicked: {}", message),
                Some(job.source().to_path_buf()),
            );
            JobResult {
                source: job.source().to_path_buf(),
                outcome: JobOutcome::Failed(JobFailure::from(&error)),
                processing_time: start.elapsed(),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
