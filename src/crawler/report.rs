//! Match accounting and the aggregate report
//!
//! Indexers record hits in a shared [`MatchLedger`]. The counter is a single
//! atomic; the ordinal returned by each increment is the match number printed
//! next to its path. Whichever indexer receives the final sentinel builds a
//! [`Report`] from the ledger and hands it to the configured [`Reporter`].

use crate::fs::DiscoveredEntry;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Hint shown when a crawl finds nothing
pub const NO_RESULTS_NOTICE: &str =
    "No matching files found. Please try again with a different search term or directory.";

/// A single hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    /// 1-based match number, in processing order
    pub ordinal: u64,

    /// Path of the matched entry
    pub path: PathBuf,

    /// Size of the matched entry in bytes
    pub size: u64,
}

/// Shared counter and list of hits
#[derive(Debug, Default)]
pub struct MatchLedger {
    counter: AtomicU64,
    bytes: AtomicU64,
    matches: Mutex<Vec<MatchRecord>>,
}

impl MatchLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit and return its ordinal
    pub fn record(&self, entry: &DiscoveredEntry) -> MatchRecord {
        let ordinal = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.bytes.fetch_add(entry.size, Ordering::Relaxed);

        let record = MatchRecord {
            ordinal,
            path: entry.path.clone(),
            size: entry.size,
        };
        self.matches.lock().push(record.clone());
        record
    }

    /// Current number of hits
    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Total size of matched entries
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Copy of all hits, ordered by ordinal
    pub fn snapshot(&self) -> Vec<MatchRecord> {
        let mut matches = self.matches.lock().clone();
        matches.sort_by_key(|m| m.ordinal);
        matches
    }
}

/// Aggregate result emitted once per run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Number of hits
    pub matched_count: u64,

    /// Total size of matched entries
    pub matched_bytes: u64,

    /// Hits, ordered by ordinal
    pub matches: Vec<MatchRecord>,

    /// Indexer that produced the report
    pub reporter_id: usize,
}

impl Report {
    /// Build a report from the ledger's current state
    pub fn from_ledger(ledger: &MatchLedger, reporter_id: usize) -> Self {
        Self {
            matched_count: ledger.count(),
            matched_bytes: ledger.bytes(),
            matches: ledger.snapshot(),
            reporter_id,
        }
    }

    /// Retry hint, present only when nothing matched
    pub fn no_results_notice(&self) -> Option<&'static str> {
        (self.matched_count == 0).then_some(NO_RESULTS_NOTICE)
    }
}

/// Receives the aggregate report
pub trait Reporter: Send + Sync {
    /// Called exactly once per completed run
    fn report(&self, report: &Report);
}

impl<F> Reporter for F
where
    F: Fn(&Report) + Send + Sync,
{
    fn report(&self, report: &Report) {
        self(report)
    }
}

/// Reporter that logs the summary through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, report: &Report) {
        info!(
            matched = report.matched_count,
            bytes = report.matched_bytes,
            reporter = report.reporter_id,
            "Crawl report"
        );
        if let Some(notice) = report.no_results_notice() {
            info!("{}", notice);
        }
    }
}

/// Pluggable step run for every hit
pub trait IndexAction: Send + Sync {
    /// Called by the indexer that recorded `record`
    fn on_match(&self, record: &MatchRecord);
}

impl<F> IndexAction for F
where
    F: Fn(&MatchRecord) + Send + Sync,
{
    fn on_match(&self, record: &MatchRecord) {
        self(record)
    }
}

/// Counting only; does nothing per hit
#[derive(Debug, Clone, Copy, Default)]
pub struct CountOnly;

impl IndexAction for CountOnly {
    fn on_match(&self, _record: &MatchRecord) {}
}
