//! Error types for disk-crawler
//!
//! This module defines the error hierarchy for:
//! - Directory enumeration (per-entry, recovered by skipping)
//! - Bounded queue operations (cancellation, disconnection)
//! - Configuration validation
//! - Producer and indexer thread lifecycle
//!
//! Per-entry errors never abort a crawl. Only configuration errors and
//! thread startup failures are fatal.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for disk-crawler
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Configuration errors (rejected before any thread starts)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Queue errors surfaced outside a worker loop
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Producer/indexer thread errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// The run hit its deadline before every task finished
    #[error("Crawl timed out after {elapsed:?} with {partial_count} partial matches")]
    TimedOut { elapsed: Duration, partial_count: u64 },

    /// The run was cancelled externally (e.g. Ctrl-C)
    #[error("Crawl cancelled with {partial_count} partial matches")]
    Cancelled { partial_count: u64 },
}

/// Errors from listing the children of a directory
#[derive(Error, Debug)]
pub enum ListError {
    /// Permission denied on a directory or entry
    #[error("Permission denied: '{}'", path.display())]
    AccessDenied { path: PathBuf },

    /// Entry disappeared between discovery and inspection
    #[error("Entry vanished during crawl: '{}'", path.display())]
    EntryVanished { path: PathBuf },

    /// Any other I/O failure
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ListError {
    /// Classify an I/O error for `path`
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => ListError::AccessDenied { path },
            io::ErrorKind::NotFound => ListError::EntryVanished { path },
            _ => ListError::Io { path, source },
        }
    }

    /// Check if this error is an expected condition on a live filesystem
    ///
    /// Expected errors are logged at debug level; anything else is a warning.
    /// Both are skipped.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ListError::AccessDenied { .. } | ListError::EntryVanished { .. }
        )
    }

    /// Path the error refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            ListError::AccessDenied { path }
            | ListError::EntryVanished { path }
            | ListError::Io { path, .. } => path,
        }
    }
}

/// Errors from blocking queue operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The caller's cancellation token fired while it was blocked
    #[error("Queue operation cancelled")]
    Cancelled,

    /// Every sender or every receiver was dropped
    #[error("Queue closed unexpectedly")]
    Closed,
}

/// A failed `put`, handing the unsent item back to the caller
#[derive(Error, Debug)]
pub enum PutError<T: std::fmt::Debug> {
    /// Cancelled while waiting for space
    #[error("Queue put cancelled")]
    Cancelled(T),

    /// All receivers dropped
    #[error("Queue closed while putting")]
    Closed(T),
}

impl<T: std::fmt::Debug> PutError<T> {
    /// Recover the item that was not enqueued
    pub fn into_inner(self) -> T {
        match self {
            PutError::Cancelled(item) | PutError::Closed(item) => item,
        }
    }
}

impl<T: std::fmt::Debug> From<PutError<T>> for QueueError {
    fn from(err: PutError<T>) -> Self {
        match err {
            PutError::Cancelled(_) => QueueError::Cancelled,
            PutError::Closed(_) => QueueError::Closed,
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid consumer (indexer) count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid queue capacity
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Zero timeout would abandon every run immediately
    #[error("Invalid timeout: must be greater than zero")]
    InvalidTimeout,

    /// No roots were given
    #[error("At least one root directory is required")]
    NoRoots,

    /// Root does not exist
    #[error("Directory '{}' does not exist", path.display())]
    RootNotFound { path: PathBuf },

    /// Root exists but is not a directory
    #[error("'{}' is not a directory", path.display())]
    RootNotDirectory { path: PathBuf },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },
}

/// Producer and indexer thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Thread panicked
    #[error("Task {task} panicked: {message}")]
    Panicked { task: String, message: String },

    /// Thread could not be spawned
    #[error("Failed to start task {task}: {reason}")]
    InitFailed { task: String, reason: String },
}

/// Result type alias for CrawlerError
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for ListError
pub type ListResult<T> = std::result::Result<T, ListError>;

/// Outcome of crawling a single directory
#[derive(Debug)]
pub enum DirOutcome {
    /// Directory listed; children were processed
    Listed {
        path: PathBuf,
        entries: usize,
        subdirs: usize,
    },

    /// Directory skipped
    Skipped { path: PathBuf, reason: String },

    /// Listing failed; the directory's subtree is skipped
    Failed { path: PathBuf, error: ListError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_error_classification() {
        let denied = ListError::from_io(
            "/secret",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(denied, ListError::AccessDenied { .. }));
        assert!(denied.is_recoverable());

        let vanished = ListError::from_io("/gone", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(vanished, ListError::EntryVanished { .. }));
        assert_eq!(vanished.path(), std::path::Path::new("/gone"));

        let other = ListError::from_io("/x", io::Error::other("disk on fire"));
        assert!(!other.is_recoverable());
    }

    #[test]
    fn test_put_error_returns_item() {
        let err: PutError<u32> = PutError::Cancelled(7);
        assert_eq!(err.into_inner(), 7);

        let err: QueueError = PutError::Closed(1u8).into();
        assert_eq!(err, QueueError::Closed);
    }

    #[test]
    fn test_error_conversion() {
        let err: CrawlerError = ConfigError::NoRoots.into();
        assert!(matches!(err, CrawlerError::Config(_)));

        let err: CrawlerError = QueueError::Cancelled.into();
        assert!(err.to_string().contains("cancelled"));
    }
}
