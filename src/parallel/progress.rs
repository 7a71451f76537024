//! Progress tracking for batch runs

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::processing::{JobOutcome, JobResult};

const CHANNEL_CAPACITY: usize = 1024;

/// Broadcasts progress events to any number of subscribers
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    sender: broadcast::Sender<ProgressUpdate>,
}

/// Snapshot of a batch in flight
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
    pub files_per_second: f64,
    pub completion_percentage: f64,
}

/// Progress update event
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Started {
        total: usize,
    },
    FileCompleted {
        source: PathBuf,
        success: bool,
        processing_time: Duration,
        state: ProgressState,
    },
    BatchCompleted {
        state: ProgressState,
    },
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Begin a batch of `total` jobs. The returned handle is owned by the
    /// aggregator, the only writer of batch progress.
    pub fn start(&self, total: usize) -> BatchProgress<'_> {
        self.emit(ProgressUpdate::Started { total });
        info!("Started progress tracking for {} files", total);

        BatchProgress {
            tracker: self,
            started: Instant::now(),
            total,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
        }
    }

    fn emit(&self, update: ProgressUpdate) {
        // No subscribers is fine
        let _ = self.sender.send(update);
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for one batch
#[derive(Debug)]
pub struct BatchProgress<'a> {
    tracker: &'a ProgressTracker,
    started: Instant,
    total: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
}

impl BatchProgress<'_> {
    /// Count a finished job and broadcast the new state
    pub fn record(&mut self, result: &JobResult) {
        match result.outcome {
            JobOutcome::Succeeded { .. } => self.succeeded += 1,
            JobOutcome::Failed(_) => self.failed += 1,
            JobOutcome::Cancelled => self.cancelled += 1,
        }

        let state = self.state();
        debug!(
            "Completed {:?} ({}/{})",
            result.source,
            self.processed(),
            self.total
        );

        self.tracker.emit(ProgressUpdate::FileCompleted {
            source: result.source.clone(),
            success: result.is_success(),
            processing_time: result.processing_time,
            state,
        });
    }

    /// Close the batch and broadcast the final state
    pub fn finish(self) -> ProgressState {
        let state = self.state();
        self.tracker.emit(ProgressUpdate::BatchCompleted {
            state: state.clone(),
        });

        info!(
            "Batch completed: {}/{} files successful in {:.2}s",
            state.succeeded,
            state.total,
            state.elapsed.as_secs_f64()
        );
        state
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    pub fn state(&self) -> ProgressState {
        let elapsed = self.started.elapsed();
        let processed = self.processed();

        let completion_percentage = if self.total > 0 {
            (processed as f64 / self.total as f64) * 100.0
        } else {
            100.0
        };

        let secs = elapsed.as_secs_f64();
        let files_per_second = if secs > 0.0 { processed as f64 / secs } else { 0.0 };

        let estimated_remaining = if processed > 0 && self.total > processed {
            let per_file = secs / processed as f64;
            Some(Duration::from_secs_f64(per_file * (self.total - processed) as f64))
        } else {
            None
        };

        ProgressState {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            cancelled: self.cancelled,
            elapsed,
            estimated_remaining,
            files_per_second,
            completion_percentage,
        }
    }
}

impl ProgressState {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    /// Human-readable completion status
    pub fn status_text(&self) -> String {
        if self.total > 0 && self.processed() >= self.total {
            "Completed".to_string()
        } else {
            format!("{}/{} files processed", self.processed(), self.total)
        }
    }

    /// Estimated time remaining as human-readable string
    pub fn eta_text(&self) -> String {
        match self.estimated_remaining {
            Some(duration) => {
                let seconds = duration.as_secs();
                if seconds < 60 {
                    format!("{}s", seconds)
                } else if seconds < 3600 {
                    format!("{}m {}s", seconds / 60, seconds % 60)
                } else {
                    format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
                }
            }
            None => "Unknown".to_string(),
        }
    }

    pub fn speed_text(&self) -> String {
        if self.files_per_second >= 1.0 {
            format!("{:.1} files/sec", self.files_per_second)
        } else if self.files_per_second > 0.0 {
            format!("{:.1} sec/file", 1.0 / self.files_per_second)
        } else {
            "Unknown".to_string()
        }
    }
}
