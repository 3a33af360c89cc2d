//! Per-run tallies.

use crate::error::Result;
use crate::resolve::Disposition;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A file that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: PathBuf,
    pub error: String,
}

/// Counts of each disposition plus the failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub no_op: usize,
    pub renamed: usize,
    pub deleted: usize,
    pub failed: usize,
    pub failures: Vec<Failure>,
    /// Dispatch stopped early on request.
    pub interrupted: bool,
}

impl Summary {
    /// Record the outcome for one file.
    pub fn record(&mut self, path: &Path, result: &Result<Disposition>) {
        match result {
            Ok(Disposition::NoOp) => self.no_op += 1,
            Ok(Disposition::Renamed { .. }) => self.renamed += 1,
            Ok(Disposition::DeletedAsDuplicate { .. }) => self.deleted += 1,
            Err(e) => self.record_failure(path, e.to_string()),
        }
    }

    /// Record a failure that happened before a file could be resolved.
    pub fn record_failure(&mut self, path: &Path, error: impl Into<String>) {
        self.failed += 1;
        self.failures.push(Failure {
            path: path.to_path_buf(),
            error: error.into(),
        });
    }

    /// Fold another worker's tallies into this one.
    pub fn merge(&mut self, other: Summary) {
        self.no_op += other.no_op;
        self.renamed += other.renamed;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.failures.extend(other.failures);
        self.interrupted |= other.interrupted;
    }

    /// Number of files that reached any disposition.
    pub fn total(&self) -> usize {
        self.no_op + self.renamed + self.deleted + self.failed
    }

    /// Whether the run changed anything on disk.
    pub fn changed(&self) -> bool {
        self.renamed + self.deleted > 0
    }
}
