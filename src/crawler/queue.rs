//! Bounded work queue with backpressure and cancellation
//!
//! One producer side (the crawlers) and one consumer side (the indexers)
//! share a fixed-capacity crossbeam channel of [`WorkItem`]s. `put` blocks
//! while the queue is full, which stalls the crawl instead of buffering an
//! unbounded tree in memory. `take` blocks while it is empty. Both wake up
//! promptly when the caller's [`CancelToken`] fires.

use crate::crawler::cancel::CancelToken;
use crate::error::{ConfigError, PutError, QueueError};
use crate::fs::DiscoveredEntry;
use crossbeam_channel::{bounded, Receiver, Select, Sender, TryRecvError, TrySendError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Minimum queue capacity (a zero-capacity channel is a rendezvous, not a queue)
pub const MIN_QUEUE_CAPACITY: usize = 1;

/// An item on the work queue
///
/// Shutdown is signalled by the sentinel variants, never by reserved paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A discovered entry to index
    Entry(DiscoveredEntry),

    /// No more work: exit without reporting
    Continue,

    /// No more work: report the aggregate result, then exit
    Final,
}

impl WorkItem {
    /// Check if this item is a shutdown sentinel
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, WorkItem::Entry(_))
    }
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued (entries and sentinels)
    pub enqueued: AtomicU64,

    /// Total items dequeued
    pub dequeued: AtomicU64,

    /// Number of puts that found the queue full and had to wait
    pub backpressure_events: AtomicU64,

    /// Continue sentinels enqueued
    pub continue_sent: AtomicU64,

    /// Final sentinels enqueued
    pub final_sent: AtomicU64,

    /// Largest queue length observed right after a put
    pub high_water_mark: AtomicUsize,
}

impl QueueStats {
    /// Get backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }

    fn record_put(&self, item_kind: ItemKind, len_after: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        match item_kind {
            ItemKind::Entry => {}
            ItemKind::Continue => {
                self.continue_sent.fetch_add(1, Ordering::Relaxed);
            }
            ItemKind::Final => {
                self.final_sent.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.high_water_mark.fetch_max(len_after, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn summary(&self, capacity: usize) -> QueueSummary {
        QueueSummary {
            capacity,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
            continue_sent: self.continue_sent.load(Ordering::Relaxed),
            final_sent: self.final_sent.load(Ordering::Relaxed),
            high_water_mark: self.high_water_mark.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`QueueStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    pub capacity: usize,
    pub enqueued: u64,
    pub dequeued: u64,
    pub backpressure_events: u64,
    pub continue_sent: u64,
    pub final_sent: u64,
    pub high_water_mark: usize,
}

#[derive(Debug, Clone, Copy)]
enum ItemKind {
    Entry,
    Continue,
    Final,
}

impl From<&WorkItem> for ItemKind {
    fn from(item: &WorkItem) -> Self {
        match item {
            WorkItem::Entry(_) => ItemKind::Entry,
            WorkItem::Continue => ItemKind::Continue,
            WorkItem::Final => ItemKind::Final,
        }
    }
}

/// Fixed-capacity FIFO shared by producers and indexers
pub struct BoundedQueue {
    /// Sender for adding items
    sender: Sender<WorkItem>,

    /// Receiver for taking items
    receiver: Receiver<WorkItem>,

    /// Queue capacity
    capacity: usize,

    /// Queue statistics
    stats: Arc<QueueStats>,
}

impl BoundedQueue {
    /// Create a new queue with the specified capacity
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity < MIN_QUEUE_CAPACITY {
            return Err(ConfigError::InvalidQueueSize {
                size: capacity,
                min: MIN_QUEUE_CAPACITY,
            });
        }

        let (sender, receiver) = bounded(capacity);

        Ok(Self {
            sender,
            receiver,
            capacity,
            stats: Arc::new(QueueStats::default()),
        })
    }

    /// Get a producer handle bound to `cancel`
    pub fn sender(&self, cancel: CancelToken) -> QueueSender {
        QueueSender {
            sender: self.sender.clone(),
            stats: Arc::clone(&self.stats),
            cancel,
        }
    }

    /// Get a consumer handle bound to `cancel`
    pub fn receiver(&self, cancel: CancelToken) -> QueueReceiver {
        QueueReceiver {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
            cancel,
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Handle for putting items on the queue
#[derive(Clone)]
pub struct QueueSender {
    sender: Sender<WorkItem>,
    stats: Arc<QueueStats>,
    cancel: CancelToken,
}

impl QueueSender {
    /// Put an item, blocking while the queue is full
    ///
    /// On cancellation or disconnection the item is handed back inside the
    /// error; it is never half-enqueued.
    pub fn put(&self, item: WorkItem) -> Result<(), PutError<WorkItem>> {
        let kind = ItemKind::from(&item);

        if self.cancel.is_cancelled() {
            return Err(PutError::Cancelled(item));
        }

        // Fast path: space available
        let item = match self.sender.try_send(item) {
            Ok(()) => {
                self.stats.record_put(kind, self.sender.len());
                return Ok(());
            }
            Err(TrySendError::Full(item)) => {
                self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                item
            }
            Err(TrySendError::Disconnected(item)) => return Err(PutError::Closed(item)),
        };

        let mut sel = Select::new();
        let send_index = sel.send(&self.sender);
        let cancel_index = sel.recv(self.cancel.signal());
        let oper = sel.select();

        if oper.index() == cancel_index {
            let _ = oper.recv(self.cancel.signal());
            return Err(PutError::Cancelled(item));
        }

        debug_assert_eq!(oper.index(), send_index);
        match oper.send(&self.sender, item) {
            Ok(()) => {
                self.stats.record_put(kind, self.sender.len());
                Ok(())
            }
            Err(err) => Err(PutError::Closed(err.into_inner())),
        }
    }

    /// Check whether this handle's token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

/// Handle for taking items from the queue
#[derive(Clone)]
pub struct QueueReceiver {
    receiver: Receiver<WorkItem>,
    stats: Arc<QueueStats>,
    cancel: CancelToken,
}

impl QueueReceiver {
    /// Take the next item, blocking while the queue is empty
    pub fn take(&self) -> Result<WorkItem, QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }

        match self.receiver.try_recv() {
            Ok(item) => return Ok(self.record_take(item)),
            Err(TryRecvError::Disconnected) => return Err(QueueError::Closed),
            Err(TryRecvError::Empty) => {}
        }

        let mut sel = Select::new();
        let recv_index = sel.recv(&self.receiver);
        let cancel_index = sel.recv(self.cancel.signal());
        let oper = sel.select();

        if oper.index() == cancel_index {
            let _ = oper.recv(self.cancel.signal());
            return Err(QueueError::Cancelled);
        }

        debug_assert_eq!(oper.index(), recv_index);
        oper.recv(&self.receiver)
            .map(|item| self.record_take(item))
            .map_err(|_| QueueError::Closed)
    }

    fn record_take(&self, item: WorkItem) -> WorkItem {
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        item
    }

    /// The token this handle observes
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
