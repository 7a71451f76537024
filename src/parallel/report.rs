//! Aggregated outcome of a batch run

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::processing::{JobFailure, JobOutcome, JobResult};

/// One entry per submitted job, keyed by source path.
///
/// Built by the aggregator only. Callers decide what counts as overall
/// success by inspecting [`BatchReport::failures`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: BTreeMap<PathBuf, JobOutcome>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// The cancellation token was set before the batch finished
    pub cancelled: bool,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, result: JobResult) {
        self.results.insert(result.source, result.outcome);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Failed(_)))
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Cancelled))
    }

    /// Failed jobs with their kind and message, in source path order
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &JobFailure)> {
        self.results.iter().filter_map(|(path, outcome)| match outcome {
            JobOutcome::Failed(failure) => Some((path.as_path(), failure)),
            _ => None,
        })
    }

    /// Written output files
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.results.values().filter_map(|outcome| match outcome {
            JobOutcome::Succeeded { output, .. } => Some(output.as_path()),
            _ => None,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.results
            .values()
            .map(|outcome| match outcome {
                JobOutcome::Succeeded { bytes_written, .. } => *bytes_written,
                _ => 0,
            })
            .sum()
    }

    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.succeeded() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn count(&self, predicate: impl Fn(&JobOutcome) -> bool) -> usize {
        self.results.values().filter(|o| predicate(o)).count()
    }
}

fn serialize_secs<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch Processing Results:")?;
        writeln!(f, "  Successful: {}", self.succeeded())?;
        if self.failed() > 0 {
            writeln!(f, "  Failed: {}", self.failed())?;
        }
        if self.cancelled_count() > 0 {
            writeln!(f, "  Cancelled: {}", self.cancelled_count())?;
        }
        writeln!(f, "  Duration: {:.2}s", self.elapsed.as_secs_f64())?;

        if self.succeeded() > 0 {
            writeln!(
                f,
                "  Speed: {:.1} files/sec, {:.2}MB written",
                self.files_per_second(),
                self.bytes_written() as f64 / 1024.0 / 1024.0
            )?;
        }

        let mut failures = self.failures().peekable();
        if failures.peek().is_some() {
            writeln!(f, "\nErrors:")?;
            for (i, (path, failure)) in failures.enumerate() {
                writeln!(f, "  {}: {:?}: {}", i + 1, path, failure.message)?;
            }
        }
        Ok(())
    }
}
