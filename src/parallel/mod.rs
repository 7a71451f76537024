//! Batch dispatch, cancellation and progress

pub mod cancel;
pub mod progress;
pub mod report;
pub mod scheduler;

pub use cancel::CancellationToken;
pub use progress::{BatchProgress, ProgressState, ProgressTracker, ProgressUpdate};
pub use report::BatchReport;
pub use scheduler::BatchScheduler;
