//! Physical removal of photo files after their records are gone.
//!
//! Failures here are collected per file and never undo a committed delete.

use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::error::{CatastroError, Result};

/// Removes stored photo files
#[cfg_attr(test, mockall::automock)]
pub trait FileCleaner {
    /// Remove the file at `path`
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Removes files from the local filesystem; a file already gone counts as removed
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFileCleaner;

impl FileCleaner for FsFileCleaner {
    fn remove(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// A file that could not be removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    /// Path that was left behind
    pub path: String,
    /// Why removal failed
    pub reason: String,
}

/// Outcome of removing a batch of photo files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Paths removed (or already absent)
    pub removed: Vec<String>,
    /// Paths that could not be removed
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// True when every file was removed
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn leftover files into a [`CatastroError::PartialCleanupFailure`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(CatastroError::PartialCleanupFailure {
                failed: self.failures.len(),
            })
        }
    }
}

/// Remove every path, continuing past failures
pub fn remove_files(cleaner: &dyn FileCleaner, paths: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();

    for path in paths.iter().filter(|p| !p.is_empty()) {
        match cleaner.remove(Path::new(path)) {
            Ok(()) => report.removed.push(path.clone()),
            Err(e) => {
                warn!(%path, error = %e, "Failed to remove photo file");
                report.failures.push(CleanupFailure {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            },
        }
    }

    crate::metrics::record_cleanup_failures(report.failures.len());
    report
}
