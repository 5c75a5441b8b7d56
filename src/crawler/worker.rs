//! Indexer (consumer) threads
//!
//! Each indexer:
//! - Takes work items from the bounded queue until it sees a sentinel
//! - Applies the match predicate to every entry
//! - Records hits in the shared ledger and runs the index action
//! - On `Continue`, arrives at the termination latch and exits
//! - On `Final`, waits for the other indexers, then reports once

use crate::crawler::cancel::CancelToken;
use crate::crawler::matcher::EntryMatcher;
use crate::crawler::queue::{QueueReceiver, WorkItem};
use crate::crawler::report::{IndexAction, MatchLedger, Report, Reporter};
use crate::crawler::shutdown::{DoneSignal, ReportGate, TaskExit, TaskId, TerminationLatch};
use crate::error::{QueueError, WorkerError};
use crossbeam_channel::Sender;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Lifecycle of an indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerState {
    /// Taking and processing entries
    Running,

    /// Holding the final sentinel and producing the report
    Reported,

    /// Done
    Terminated,
}

/// Statistics collected by an indexer
#[derive(Debug, Default)]
pub struct IndexerStats {
    /// Entries taken from the queue
    pub processed: AtomicU64,

    /// Entries that matched
    pub matched: AtomicU64,
}

impl IndexerStats {
    fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_match(&self) {
        self.matched.fetch_add(1, Ordering::Relaxed);
    }

    /// Entries taken from the queue
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Entries that matched
    pub fn matched(&self) -> u64 {
        self.matched.load(Ordering::Relaxed)
    }
}

/// State shared by every indexer in a run
pub struct IndexerContext {
    pub matcher: Arc<dyn EntryMatcher>,
    pub action: Arc<dyn IndexAction>,
    pub reporter: Arc<dyn Reporter>,
    pub ledger: Arc<MatchLedger>,
    pub latch: TerminationLatch,
    pub gate: ReportGate,

    /// Number of indexers (N)
    pub consumer_count: usize,

    /// Upper bound of the simulated per-entry processing cost
    pub max_delay: Option<Duration>,
}

impl IndexerContext {
    /// Create a context for `consumer_count` indexers writing to `ledger`
    pub fn new(
        consumer_count: usize,
        matcher: Arc<dyn EntryMatcher>,
        action: Arc<dyn IndexAction>,
        reporter: Arc<dyn Reporter>,
        ledger: Arc<MatchLedger>,
    ) -> Self {
        Self {
            matcher,
            action,
            reporter,
            ledger,
            latch: TerminationLatch::new(),
            gate: ReportGate::new(),
            consumer_count,
            max_delay: None,
        }
    }

    /// Set the simulated per-entry processing cost
    pub fn with_max_delay(mut self, delay: Option<Duration>) -> Self {
        self.max_delay = delay.filter(|d| !d.is_zero());
        self
    }
}

/// An indexer thread
pub struct Indexer {
    /// Indexer ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<IndexerState>>,

    /// Indexer statistics
    stats: Arc<IndexerStats>,
}

impl Indexer {
    /// Spawn a new indexer thread
    pub fn spawn(
        id: usize,
        ctx: Arc<IndexerContext>,
        queue_rx: QueueReceiver,
        done: Sender<TaskExit>,
    ) -> Result<Self, WorkerError> {
        let stats = Arc::new(IndexerStats::default());
        let stats_clone = Arc::clone(&stats);
        let task = TaskId::Indexer(id);

        let handle = thread::Builder::new()
            .name(task.to_string())
            .spawn(move || {
                let _done = DoneSignal::new(task, done);
                indexer_loop(id, &ctx, &queue_rx, &stats_clone)
            })
            .map_err(|e| WorkerError::InitFailed {
                task: task.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get indexer ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get indexer statistics
    pub fn stats(&self) -> &IndexerStats {
        &self.stats
    }

    /// Wait for the indexer to finish
    pub fn join(mut self) -> Result<IndexerState, WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked {
                task: TaskId::Indexer(self.id).to_string(),
                message: "Indexer thread panicked".into(),
            }),
            None => Ok(IndexerState::Terminated),
        }
    }
}

/// Main indexer loop
pub(crate) fn indexer_loop(
    id: usize,
    ctx: &IndexerContext,
    queue_rx: &QueueReceiver,
    stats: &IndexerStats,
) -> IndexerState {
    debug!(indexer = id, "Indexer starting");

    let mut state = IndexerState::Running;

    while state == IndexerState::Running {
        let item = match queue_rx.take() {
            Ok(item) => item,
            Err(QueueError::Cancelled) => {
                debug!(indexer = id, "Indexer cancelled");
                return IndexerState::Terminated;
            }
            Err(QueueError::Closed) => {
                warn!(indexer = id, "Queue closed before a sentinel arrived");
                return IndexerState::Terminated;
            }
        };

        state = match item {
            WorkItem::Entry(entry) => {
                stats.record_processed();

                if ctx.matcher.matches(&entry) {
                    stats.record_match();
                    let record = ctx.ledger.record(&entry);
                    trace!(indexer = id, ordinal = record.ordinal, path = %record.path.display(), "Match");
                    ctx.action.on_match(&record);
                }

                if let Some(max) = ctx.max_delay {
                    simulate_work(max);
                }

                IndexerState::Running
            }
            WorkItem::Continue => {
                ctx.latch.arrive();
                IndexerState::Terminated
            }
            WorkItem::Final => IndexerState::Reported,
        };
    }

    if state == IndexerState::Reported {
        finish_report(id, ctx, queue_rx.cancel_token());
    }

    debug!(
        indexer = id,
        processed = stats.processed(),
        matched = stats.matched(),
        "Indexer finished"
    );
    IndexerState::Terminated
}

/// Wait for the other indexers to stop counting, then emit the report
fn finish_report(id: usize, ctx: &IndexerContext, cancel: &CancelToken) {
    let others = ctx.consumer_count.saturating_sub(1);

    if !ctx.latch.wait_for(others, cancel) {
        debug!(indexer = id, "Cancelled while waiting to report");
        return;
    }

    if !ctx.gate.claim() {
        warn!(indexer = id, "Report already emitted");
        return;
    }

    let report = Report::from_ledger(&ctx.ledger, id);
    info!(indexer = id, matched = report.matched_count, "Reporting");
    ctx.reporter.report(&report);
}

fn simulate_work(max: Duration) {
    let millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    let pause = rand::thread_rng().gen_range(0..=millis);
    if pause > 0 {
        thread::sleep(Duration::from_millis(pause));
    }
}
