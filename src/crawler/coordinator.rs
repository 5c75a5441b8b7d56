//! Crawl coordinator - orchestrates the producer/consumer pipeline
//!
//! The coordinator is responsible for:
//! - Validating configuration before any thread starts
//! - Setting up the bounded queue, the indexer pool and one crawler per root
//! - Waiting for every task, bounded by the run timeout
//! - Cancelling and abandoning stragglers when the deadline passes
//! - Collecting the aggregate outcome

use crate::config::CrawlConfig;
use crate::crawler::cancel::CancelToken;
use crate::crawler::dedup::{DedupRegistry, SeenSet, SharedDedupRegistry};
use crate::crawler::matcher::{matcher_for, EntryFilter, EntryMatcher, ExcludeFilter};
use crate::crawler::producer::{CrawlOptions, CrawlStats, CrawlSummary, Crawler, Producer};
use crate::crawler::queue::{BoundedQueue, QueueStats, QueueSummary};
use crate::crawler::report::{CountOnly, IndexAction, LogReporter, MatchLedger, MatchRecord, Reporter};
use crate::crawler::shutdown::{ProducerGroup, TaskExit, TaskId};
use crate::crawler::worker::{Indexer, IndexerContext};
use crate::error::{CrawlerError, Result, WorkerError};
use crate::fs::{DirectoryLister, LocalLister};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long tasks get to exit after a timeout cancels them
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Interval between progress callbacks
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task finished and the report was emitted
    Completed,

    /// The deadline passed first; counts are partial
    TimedOut,

    /// The run was cancelled externally; counts are partial
    Cancelled,
}

/// Result of a crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    /// Number of matched entries
    pub matched_count: u64,

    /// Total size of matched entries
    pub matched_bytes: u64,

    /// Matched entries, ordered by ordinal
    pub matches: Vec<MatchRecord>,

    /// How the run ended
    pub status: RunStatus,

    /// Crawler statistics
    pub crawl: CrawlSummary,

    /// Queue statistics
    pub queue: QueueSummary,

    /// Reports emitted (1 for a completed run, never more)
    pub reports_emitted: usize,

    /// Tasks abandoned after the grace period
    pub abandoned_tasks: usize,

    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,

    /// Time taken for the run
    pub elapsed: Duration,
}

impl CrawlOutcome {
    /// Check if the run finished normally
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Check if the counts are partial
    pub fn is_partial(&self) -> bool {
        !self.is_complete()
    }

    /// Turn a partial outcome into the matching error
    pub fn into_complete(self) -> Result<Self> {
        match self.status {
            RunStatus::Completed => Ok(self),
            RunStatus::TimedOut => Err(CrawlerError::TimedOut {
                elapsed: self.elapsed,
                partial_count: self.matched_count,
            }),
            RunStatus::Cancelled => Err(CrawlerError::Cancelled {
                partial_count: self.matched_count,
            }),
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct CrawlProgress {
    /// Directories listed
    pub dirs: u64,

    /// Entries put on the queue
    pub enqueued: u64,

    /// Entries matched so far
    pub matched: u64,

    /// Current queue length
    pub queue_len: usize,

    /// Queue capacity
    pub queue_capacity: usize,

    /// Listing errors so far
    pub errors: u64,

    /// Elapsed time
    pub elapsed: Duration,
}

impl CrawlProgress {
    /// Calculate enqueued entries per second
    pub fn entries_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.enqueued as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates crawlers and indexers for one run
pub struct CrawlCoordinator {
    /// Validated configuration
    config: CrawlConfig,

    /// Work queue between crawlers and indexers
    queue: BoundedQueue,

    lister: Arc<dyn DirectoryLister>,
    filter: Arc<dyn EntryFilter>,
    matcher: Arc<dyn EntryMatcher>,
    action: Arc<dyn IndexAction>,
    reporter: Arc<dyn Reporter>,

    /// Cancellation for every blocking queue operation
    cancel: CancelToken,

    /// Time tasks get to exit after a timeout
    grace_period: Duration,

    /// Shared crawler statistics
    crawl_stats: Arc<CrawlStats>,

    /// Shared match counter
    ledger: Arc<MatchLedger>,
}

impl CrawlCoordinator {
    /// Create a new coordinator; fails if the configuration is invalid
    pub fn new(config: CrawlConfig) -> Result<Self> {
        config.validate()?;

        let queue = BoundedQueue::new(config.queue_size)?;
        let filter: Arc<dyn EntryFilter> =
            Arc::new(ExcludeFilter::new(config.exclude_patterns.clone()));
        let matcher = matcher_for(config.term.as_deref());

        Ok(Self {
            config,
            queue,
            lister: Arc::new(LocalLister::new()),
            filter,
            matcher,
            action: Arc::new(CountOnly),
            reporter: Arc::new(LogReporter),
            cancel: CancelToken::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            crawl_stats: Arc::new(CrawlStats::default()),
            ledger: Arc::new(MatchLedger::new()),
        })
    }

    /// Use a custom directory lister
    pub fn with_lister(mut self, lister: Arc<dyn DirectoryLister>) -> Self {
        self.lister = lister;
        self
    }

    /// Replace the exclude-pattern filter
    pub fn with_filter(mut self, filter: Arc<dyn EntryFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the term matcher
    pub fn with_matcher(mut self, matcher: Arc<dyn EntryMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Run `action` for every match
    pub fn with_action(mut self, action: Arc<dyn IndexAction>) -> Self {
        self.action = action;
        self
    }

    /// Send the final report to `reporter`
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Set how long tasks get to exit after a timeout
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Get a clone of the cancel token (for signal handlers)
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Get the configuration
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Run the crawl with a progress callback driven from a side thread
    pub fn run_with_progress<F>(self, progress_callback: F) -> Result<CrawlOutcome>
    where
        F: Fn(CrawlProgress) + Send + 'static,
    {
        let start = Instant::now();
        let finished = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&finished);
        let crawl_stats = Arc::clone(&self.crawl_stats);
        let ledger = Arc::clone(&self.ledger);
        let queue_stats = self.queue.stats();
        let queue_capacity = self.queue.capacity();

        // Always emits at least one update, and a last one after the run ends
        let progress_handle = thread::spawn(move || loop {
            let done = stop.load(Ordering::SeqCst);
            let summary = crawl_stats.summary();
            progress_callback(CrawlProgress {
                dirs: summary.dirs_listed,
                enqueued: summary.enqueued,
                matched: ledger.count(),
                queue_len: queue_len(&queue_stats),
                queue_capacity,
                errors: summary.errors,
                elapsed: start.elapsed(),
            });
            if done {
                break;
            }
            thread::sleep(PROGRESS_INTERVAL);
        });

        let result = self.run();

        finished.store(true, Ordering::SeqCst);
        let _ = progress_handle.join();

        result
    }

    /// Run the crawl
    pub fn run(self) -> Result<CrawlOutcome> {
        let start = Instant::now();
        let started_at = Utc::now();
        let consumer_count = self.config.worker_count;

        info!(
            roots = self.config.roots.len(),
            workers = consumer_count,
            queue_size = self.config.queue_size,
            term = self.config.term.as_deref().unwrap_or("<all>"),
            "Starting crawl"
        );

        let (done_tx, done_rx) = unbounded();

        let ctx = Arc::new(
            IndexerContext::new(
                consumer_count,
                Arc::clone(&self.matcher),
                Arc::clone(&self.action),
                Arc::clone(&self.reporter),
                Arc::clone(&self.ledger),
            )
            .with_max_delay(self.config.delay),
        );

        // Indexers first so the queue drains as soon as crawlers fill it
        let indexers = match self.spawn_indexers(&ctx, &done_tx) {
            Ok(indexers) => indexers,
            Err(e) => {
                self.cancel.cancel();
                return Err(e.into());
            }
        };

        let producers = match self.spawn_producers(&done_tx) {
            Ok(producers) => producers,
            Err(e) => {
                self.cancel.cancel();
                return Err(e.into());
            }
        };
        drop(done_tx);

        info!(
            crawlers = producers.len(),
            indexers = indexers.len(),
            "Tasks spawned"
        );

        let expected = producers.len() + indexers.len();
        // A timeout too large to represent means no deadline
        let deadline = start.checked_add(self.config.timeout);
        let mut waiter = TaskWaiter::new(done_rx, expected);

        let timed_out = !waiter.wait_until(deadline);
        if timed_out {
            warn!(
                timeout_secs = self.config.timeout.as_secs_f64(),
                pending = waiter.pending(),
                "Crawl timed out, cancelling"
            );
        }

        if timed_out || waiter.panicked().is_some() {
            self.cancel.cancel();
            waiter.wait_until(Instant::now().checked_add(self.grace_period));
        }

        // Join finished tasks; detach the rest
        let mut abandoned = 0;
        let mut panic_error = None;

        for producer in producers {
            let task = TaskId::Producer(producer.id());
            if !waiter.has_exited(task) {
                abandoned += 1;
                continue;
            }
            match producer.join() {
                Ok(exit) => debug!(task = %task, exit = ?exit, "Crawler joined"),
                Err(e) => panic_error = panic_error.or(Some(e)),
            }
        }

        for indexer in indexers {
            let task = TaskId::Indexer(indexer.id());
            if !waiter.has_exited(task) {
                abandoned += 1;
                continue;
            }
            match indexer.join() {
                Ok(state) => debug!(task = %task, state = ?state, "Indexer joined"),
                Err(e) => panic_error = panic_error.or(Some(e)),
            }
        }

        if abandoned > 0 {
            warn!(abandoned, "Tasks did not exit within the grace period and were abandoned");
        }

        if let Some(e) = panic_error {
            return Err(e.into());
        }
        if let Some(task) = waiter.panicked() {
            return Err(WorkerError::Panicked {
                task: task.to_string(),
                message: "Task panicked and could not be joined".into(),
            }
            .into());
        }

        let status = if timed_out {
            RunStatus::TimedOut
        } else if self.cancel.is_cancelled() && ctx.gate.reports_emitted() == 0 {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };

        let elapsed = start.elapsed();
        let outcome = CrawlOutcome {
            matched_count: self.ledger.count(),
            matched_bytes: self.ledger.bytes(),
            matches: self.ledger.snapshot(),
            status,
            crawl: self.crawl_stats.summary(),
            queue: self.queue.stats().summary(self.queue.capacity()),
            reports_emitted: ctx.gate.reports_emitted(),
            abandoned_tasks: abandoned,
            started_at,
            elapsed,
        };

        info!(
            matched = outcome.matched_count,
            enqueued = outcome.crawl.enqueued,
            duplicates = outcome.crawl.duplicates,
            errors = outcome.crawl.errors,
            status = ?outcome.status,
            duration_ms = elapsed.as_millis() as u64,
            "Crawl finished"
        );

        Ok(outcome)
    }

    /// Spawn the indexer pool
    fn spawn_indexers(
        &self,
        ctx: &Arc<IndexerContext>,
        done: &Sender<TaskExit>,
    ) -> std::result::Result<Vec<Indexer>, WorkerError> {
        (0..self.config.worker_count)
            .map(|id| {
                Indexer::spawn(
                    id,
                    Arc::clone(ctx),
                    self.queue.receiver(self.cancel.clone()),
                    done.clone(),
                )
            })
            .collect()
    }

    /// Spawn one crawler per root
    ///
    /// A single crawler owns its registry; several share one.
    fn spawn_producers(&self, done: &Sender<TaskExit>) -> std::result::Result<Vec<Producer>, WorkerError> {
        let roots = &self.config.roots;
        let group = Arc::new(ProducerGroup::new(roots.len(), self.config.worker_count));

        if let [root] = roots.as_slice() {
            let producer = self.spawn_producer(0, root.clone(), DedupRegistry::new(), &group, done)?;
            return Ok(vec![producer]);
        }

        let shared = SharedDedupRegistry::new();
        roots
            .iter()
            .enumerate()
            .map(|(id, root)| self.spawn_producer(id, root.clone(), shared.clone(), &group, done))
            .collect()
    }

    fn spawn_producer<R: SeenSet + 'static>(
        &self,
        id: usize,
        root: PathBuf,
        registry: R,
        group: &Arc<ProducerGroup>,
        done: &Sender<TaskExit>,
    ) -> std::result::Result<Producer, WorkerError> {
        let options = CrawlOptions {
            max_depth: self.config.max_depth,
            follow_links: self.config.follow_links,
        };

        let crawler = Crawler::new(
            root,
            Arc::clone(&self.lister),
            registry,
            Arc::clone(&self.filter),
            options,
            self.queue.sender(self.cancel.clone()),
            Arc::clone(&self.crawl_stats),
        );

        Producer::spawn(id, crawler, Arc::clone(group), done.clone())
    }
}

fn queue_len(stats: &QueueStats) -> usize {
    let enqueued = stats.enqueued.load(Ordering::Relaxed);
    let dequeued = stats.dequeued.load(Ordering::Relaxed);
    usize::try_from(enqueued.saturating_sub(dequeued)).unwrap_or(usize::MAX)
}

/// Collects completion notices from pipeline threads
struct TaskWaiter {
    done_rx: Receiver<TaskExit>,
    expected: usize,
    exited: HashSet<TaskId>,
    panicked: Option<TaskId>,
}

impl TaskWaiter {
    fn new(done_rx: Receiver<TaskExit>, expected: usize) -> Self {
        Self {
            done_rx,
            expected,
            exited: HashSet::with_capacity(expected),
            panicked: None,
        }
    }

    /// Wait until every task has exited, a task panics, or `deadline` passes
    ///
    /// Returns false only if the deadline passed first. `None` waits without
    /// a deadline.
    fn wait_until(&mut self, deadline: Option<Instant>) -> bool {
        while self.exited.len() < self.expected {
            let received = match deadline {
                Some(deadline) => self.done_rx.recv_deadline(deadline),
                None => self
                    .done_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(exit) => {
                    debug!(task = %exit.task, panicked = exit.panicked, "Task exited");
                    self.exited.insert(exit.task);
                    if exit.panicked {
                        self.panicked = self.panicked.or(Some(exit.task));
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return true,
            }
        }
        true
    }

    fn has_exited(&self, task: TaskId) -> bool {
        self.exited.contains(&task)
    }

    fn pending(&self) -> usize {
        self.expected - self.exited.len()
    }

    fn panicked(&self) -> Option<TaskId> {
        self.panicked
    }
}

/// Crawl `roots` with `consumer_count` indexers and a queue of `queue_capacity`
///
/// `match_term` selects a case-insensitive file name match; `None` counts
/// every file.
pub fn run(
    roots: Vec<PathBuf>,
    match_term: Option<&str>,
    consumer_count: usize,
    queue_capacity: usize,
    timeout: Duration,
) -> Result<CrawlOutcome> {
    let mut config = CrawlConfig::new(roots);
    config.term = match_term.map(str::to_string);
    config.worker_count = consumer_count;
    config.queue_size = queue_capacity;
    config.timeout = timeout;

    CrawlCoordinator::new(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_crawl_progress_rate() {
        let progress = CrawlProgress {
            enqueued: 5000,
            elapsed: Duration::from_secs(10),
            ..Default::default()
        };
        assert!((progress.entries_per_second() - 500.0).abs() < 0.1);
        assert_eq!(CrawlProgress::default().entries_per_second(), 0.0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = CrawlConfig::new(vec![PathBuf::from("/data")]);
        config.worker_count = 0;
        assert!(matches!(
            CrawlCoordinator::new(config),
            Err(CrawlerError::Config(ConfigError::InvalidWorkerCount { .. }))
        ));

        assert!(matches!(
            run(Vec::new(), None, 1, 1, Duration::from_secs(1)),
            Err(CrawlerError::Config(ConfigError::NoRoots))
        ));
    }

    #[test]
    fn test_into_complete() {
        let outcome = CrawlOutcome {
            matched_count: 3,
            matched_bytes: 0,
            matches: Vec::new(),
            status: RunStatus::TimedOut,
            crawl: CrawlSummary::default(),
            queue: QueueSummary::default(),
            reports_emitted: 0,
            abandoned_tasks: 1,
            started_at: Utc::now(),
            elapsed: Duration::from_secs(2),
        };
        assert!(outcome.is_partial());
        assert!(matches!(
            outcome.clone().into_complete(),
            Err(CrawlerError::TimedOut { partial_count: 3, .. })
        ));

        let cancelled = CrawlOutcome {
            status: RunStatus::Cancelled,
            ..outcome.clone()
        };
        assert!(matches!(
            cancelled.into_complete(),
            Err(CrawlerError::Cancelled { partial_count: 3 })
        ));

        let done = CrawlOutcome {
            status: RunStatus::Completed,
            ..outcome
        };
        assert!(done.into_complete().is_ok());
    }

    #[test]
    fn test_single_root_run() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.log"] {
            std::fs::write(dir.path().join(name), b"data").unwrap();
        }

        let outcome = run(
            vec![dir.path().to_path_buf()],
            Some("txt"),
            3,
            2,
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.matched_count, 2);
        assert_eq!(outcome.matched_bytes, 8);
        assert_eq!(outcome.reports_emitted, 1);
        assert_eq!(outcome.queue.continue_sent, 2);
        assert_eq!(outcome.queue.final_sent, 1);
        assert!(outcome.queue.high_water_mark <= 2);
    }

    #[test]
    fn test_unbounded_timeout_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["one.txt", "two.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        for timeout in [Duration::MAX, Duration::from_secs(u64::MAX)] {
            let outcome = run(vec![dir.path().to_path_buf()], None, 2, 4, timeout).unwrap();
            assert_eq!(outcome.status, RunStatus::Completed);
            assert_eq!(outcome.matched_count, 2);
            assert_eq!(outcome.abandoned_tasks, 0);
        }
    }

    #[test]
    fn test_task_waiter_without_deadline() {
        let (tx, rx) = unbounded();
        let mut waiter = TaskWaiter::new(rx, 2);
        tx.send(TaskExit { task: TaskId::Producer(0), panicked: false }).unwrap();
        tx.send(TaskExit { task: TaskId::Indexer(0), panicked: false }).unwrap();

        assert!(waiter.wait_until(None));
        assert_eq!(waiter.pending(), 0);
        assert!(waiter.has_exited(TaskId::Indexer(0)));
    }
}
