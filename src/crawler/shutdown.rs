//! Graceful shutdown protocol
//!
//! The crawl ends with a sentinel fan-out: N-1 `Continue` items followed by
//! one `Final`, where N is the number of indexers. Each indexer consumes
//! exactly one sentinel and exits, so every indexer stops and exactly one
//! of them, chosen by the race for the queue, reports.
//!
//! ```text
//!  producers ──► [e e e e C C C F] ──► indexers
//!                          │ │ │ │
//!                          │ │ │ └─ reporter: waits on latch, then reports
//!                          └─┴─┴─── arrive at latch, exit
//! ```
//!
//! Before reading the counter, the reporter waits on a [`TerminationLatch`]
//! for the N-1 other indexers. They only take a sentinel after finishing
//! their previous entry, so once all have arrived no increment is in flight.

use crate::crawler::cancel::CancelToken;
use crate::crawler::queue::{QueueSender, WorkItem};
use crate::error::QueueError;
use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// How often a waiting reporter re-checks for cancellation
const LATCH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Enqueue the shutdown fan-out for `consumer_count` indexers
pub fn emit_sentinels(sender: &QueueSender, consumer_count: usize) -> Result<(), QueueError> {
    for _ in 1..consumer_count {
        sender.put(WorkItem::Continue)?;
    }
    sender.put(WorkItem::Final)?;

    debug!(continues = consumer_count.saturating_sub(1), "Sentinels enqueued");
    Ok(())
}

/// Tracks live producers so the fan-out is emitted once, by the last one out
#[derive(Debug)]
pub struct ProducerGroup {
    remaining: AtomicUsize,
    consumer_count: usize,
}

impl ProducerGroup {
    /// Create a group of `producers` producers feeding `consumer_count` indexers
    pub fn new(producers: usize, consumer_count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(producers),
            consumer_count,
        }
    }

    /// Mark one producer finished
    ///
    /// Returns `Ok(true)` if this call emitted the sentinels.
    pub fn finish(&self, sender: &QueueSender) -> Result<bool, QueueError> {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            emit_sentinels(sender, self.consumer_count)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Producers that have not finished yet
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

/// Counts indexers that have observed a terminal sentinel
#[derive(Debug, Default)]
pub struct TerminationLatch {
    arrived: Mutex<usize>,
    cond: Condvar,
}

impl TerminationLatch {
    /// Create a latch with no arrivals
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that one indexer has stopped incrementing
    pub fn arrive(&self) {
        let mut arrived = self.arrived.lock();
        *arrived += 1;
        self.cond.notify_all();
    }

    /// Number of arrivals so far
    pub fn arrived(&self) -> usize {
        *self.arrived.lock()
    }

    /// Block until `count` indexers have arrived
    ///
    /// Returns false if `cancel` fired first.
    pub fn wait_for(&self, count: usize, cancel: &CancelToken) -> bool {
        let mut arrived = self.arrived.lock();
        while *arrived < count {
            if cancel.is_cancelled() {
                return false;
            }
            self.cond.wait_for(&mut arrived, LATCH_POLL_INTERVAL);
        }
        true
    }
}

/// Admits at most one report per run
#[derive(Debug, Default)]
pub struct ReportGate {
    claimed: AtomicBool,
    attempts: AtomicUsize,
}

impl ReportGate {
    /// Create an unclaimed gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to report; true for the first caller only
    pub fn claim(&self) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Number of reports emitted (0 or 1)
    pub fn reports_emitted(&self) -> usize {
        usize::from(self.claimed.load(Ordering::SeqCst))
    }

    /// Number of claim attempts
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Identifies a pipeline thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// Crawler for the root at this index
    Producer(usize),
    /// Indexer with this id
    Indexer(usize),
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskId::Producer(id) => write!(f, "crawler-{}", id),
            TaskId::Indexer(id) => write!(f, "indexer-{}", id),
        }
    }
}

/// Completion notice sent when a pipeline thread exits
#[derive(Debug, Clone, Copy)]
pub struct TaskExit {
    pub task: TaskId,
    pub panicked: bool,
}

/// Sends a [`TaskExit`] when dropped, including during a panic unwind
pub struct DoneSignal {
    task: TaskId,
    done: Sender<TaskExit>,
}

impl DoneSignal {
    /// Arm a signal for `task`
    pub fn new(task: TaskId, done: Sender<TaskExit>) -> Self {
        Self { task, done }
    }
}

impl Drop for DoneSignal {
    fn drop(&mut self) {
        let _ = self.done.send(TaskExit {
            task: self.task,
            panicked: std::thread::panicking(),
        });
    }
}
