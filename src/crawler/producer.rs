//! Crawler (producer) threads
//!
//! Each crawler:
//! - Walks one root depth-first through a [`DirectoryLister`]
//! - Filters children and consults the dedup registry
//! - Puts accepted entries on the bounded queue (blocking on backpressure)
//! - Skips entries and directories that fail to list, never aborting
//! - Reports to its [`ProducerGroup`]; the last one out emits the sentinels

use crate::crawler::dedup::SeenSet;
use crate::crawler::matcher::EntryFilter;
use crate::crawler::queue::{QueueSender, WorkItem};
use crate::crawler::shutdown::{DoneSignal, ProducerGroup, TaskExit, TaskId};
use crate::error::{DirOutcome, ListError, QueueError, WorkerError};
use crate::fs::{DedupKey, DirectoryLister, DiscoveredEntry};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Statistics shared by every crawler in a run
#[derive(Debug, Default)]
pub struct CrawlStats {
    /// Directories listed
    pub dirs_listed: AtomicU64,

    /// Non-directory entries seen
    pub entries_seen: AtomicU64,

    /// Entries put on the queue
    pub enqueued: AtomicU64,

    /// Entries suppressed by the dedup registry
    pub duplicates: AtomicU64,

    /// Entries and directories rejected by the filter
    pub filtered: AtomicU64,

    /// Directories not entered (depth limit, links, cycles)
    pub skipped_dirs: AtomicU64,

    /// Listing errors (skipped)
    pub errors: AtomicU64,
}

impl CrawlStats {
    fn record_dir(&self) {
        self.dirs_listed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_seen(&self) {
        self.entries_seen.fetch_add(1, Ordering::Relaxed);
    }

    fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped_dirs.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            dirs_listed: self.dirs_listed.load(Ordering::Relaxed),
            entries_seen: self.entries_seen.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            skipped_dirs: self.skipped_dirs.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub dirs_listed: u64,
    pub entries_seen: u64,
    pub enqueued: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub skipped_dirs: u64,
    pub errors: u64,
}

/// Traversal options
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlOptions {
    /// Deepest directory level entered (root = 0); unlimited if `None`
    pub max_depth: Option<usize>,

    /// Descend into symlinked directories
    pub follow_links: bool,
}

/// Depth-first walker feeding the queue
pub struct Crawler<R: SeenSet> {
    root: PathBuf,
    lister: Arc<dyn DirectoryLister>,
    registry: R,
    filter: Arc<dyn EntryFilter>,
    options: CrawlOptions,
    sender: QueueSender,
    stats: Arc<CrawlStats>,

    /// Directory identities entered, used to break link cycles
    visited_dirs: HashSet<DedupKey>,
}

impl<R: SeenSet> Crawler<R> {
    /// Create a crawler for `root`
    pub fn new(
        root: PathBuf,
        lister: Arc<dyn DirectoryLister>,
        registry: R,
        filter: Arc<dyn EntryFilter>,
        options: CrawlOptions,
        sender: QueueSender,
        stats: Arc<CrawlStats>,
    ) -> Self {
        Self {
            root,
            lister,
            registry,
            filter,
            options,
            sender,
            stats,
            visited_dirs: HashSet::new(),
        }
    }

    /// Walk the whole tree, putting accepted entries on the queue
    ///
    /// Fails only if a queue operation fails (cancellation or disconnection).
    pub fn crawl(&mut self) -> Result<(), QueueError> {
        let root = self.root.clone();

        if self.options.follow_links {
            if let Ok(key) = self.lister.identify(&root) {
                self.visited_dirs.insert(key);
            }
        }

        let outcome = self.crawl_dir(&root, 0)?;
        log_outcome(&outcome);
        Ok(())
    }

    /// Walk the tree, then report to `group` (emitting sentinels if last)
    pub fn run(mut self, group: &ProducerGroup) -> Result<bool, QueueError> {
        self.crawl()?;
        group.finish(&self.sender)
    }

    fn crawl_dir(&mut self, dir: &Path, depth: usize) -> Result<DirOutcome, QueueError> {
        if self.sender.is_cancelled() {
            return Err(QueueError::Cancelled);
        }

        let listing = match self.lister.list_children(dir) {
            Ok(listing) => listing,
            Err(error) => {
                self.stats.record_error();
                return Ok(DirOutcome::Failed {
                    path: dir.to_path_buf(),
                    error,
                });
            }
        };

        self.stats.record_dir();

        for error in &listing.errors {
            self.stats.record_error();
            log_entry_error(error);
        }

        let entry_count = listing.entries.len();
        let mut subdir_count = 0;

        for child in listing.entries {
            if !self.filter.accept(&child) {
                self.stats.record_filtered();
                continue;
            }

            if child.is_dir() {
                if let Some(reason) = self.should_skip_dir(&child, depth) {
                    self.stats.record_skip();
                    log_outcome(&DirOutcome::Skipped {
                        path: child.path,
                        reason,
                    });
                    continue;
                }

                subdir_count += 1;
                let outcome = self.crawl_dir(&child.path, depth + 1)?;
                log_outcome(&outcome);
                continue;
            }

            self.stats.record_seen();

            let Some(entry) = DiscoveredEntry::from_child(&child) else {
                trace!(path = %child.path.display(), "Unresolvable entry skipped");
                continue;
            };

            if self.registry.mark_and_check(&entry.key) {
                self.sender
                    .put(WorkItem::Entry(entry))
                    .map_err(QueueError::from)?;
                self.stats.record_enqueued();
            } else {
                self.stats.record_duplicate();
                trace!(path = %entry.path.display(), "Duplicate entry skipped");
            }
        }

        Ok(DirOutcome::Listed {
            path: dir.to_path_buf(),
            entries: entry_count,
            subdirs: subdir_count,
        })
    }

    fn should_skip_dir(&mut self, child: &crate::fs::ChildEntry, depth: usize) -> Option<String> {
        if let Some(max_depth) = self.options.max_depth {
            if depth + 1 > max_depth {
                return Some(format!("Exceeded max depth {}", max_depth));
            }
        }

        if child.is_symlink {
            if !self.options.follow_links {
                return Some("Symlinked directory not followed".into());
            }
            // Only linked directories can close a cycle
            if let Some(key) = &child.identity {
                if !self.visited_dirs.insert(key.clone()) {
                    return Some("Directory already visited".into());
                }
            }
        }

        None
    }
}

fn log_outcome(outcome: &DirOutcome) {
    match outcome {
        DirOutcome::Listed {
            path,
            entries,
            subdirs,
        } => {
            trace!(path = %path.display(), entries, subdirs, "Directory crawled");
        }
        DirOutcome::Skipped { path, reason } => {
            debug!(path = %path.display(), reason = %reason, "Directory skipped");
        }
        DirOutcome::Failed { path, error } => {
            if error.is_recoverable() {
                debug!(path = %path.display(), error = %error, "Directory skipped");
            } else {
                warn!(path = %path.display(), error = %error, "Directory failed");
            }
        }
    }
}

fn log_entry_error(error: &ListError) {
    if error.is_recoverable() {
        debug!(error = %error, "Entry skipped");
    } else {
        warn!(error = %error, "Entry failed");
    }
}

/// How a producer thread ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    /// Walk finished; `emitted_sentinels` is true for the last producer out
    Finished { emitted_sentinels: bool },

    /// A queue operation was cancelled
    Cancelled,

    /// The queue was closed
    Closed,
}

/// A crawler running on its own thread
pub struct Producer {
    /// Root index
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<ProducerExit>>,
}

impl Producer {
    /// Spawn a crawler thread
    pub fn spawn<R: SeenSet + 'static>(
        id: usize,
        crawler: Crawler<R>,
        group: Arc<ProducerGroup>,
        done: Sender<TaskExit>,
    ) -> Result<Self, WorkerError> {
        let task = TaskId::Producer(id);

        let handle = thread::Builder::new()
            .name(task.to_string())
            .spawn(move || {
                let _done = DoneSignal::new(task, done);
                producer_loop(id, crawler, &group)
            })
            .map_err(|e| WorkerError::InitFailed {
                task: task.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get the root index this producer crawls
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the producer to finish
    pub fn join(mut self) -> Result<ProducerExit, WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked {
                task: TaskId::Producer(self.id).to_string(),
                message: "Crawler thread panicked".into(),
            }),
            None => Ok(ProducerExit::Cancelled),
        }
    }
}

fn producer_loop<R: SeenSet>(id: usize, crawler: Crawler<R>, group: &ProducerGroup) -> ProducerExit {
    info!(crawler = id, root = %crawler.root.display(), "Crawler starting");

    let exit = match crawler.run(group) {
        Ok(emitted_sentinels) => ProducerExit::Finished { emitted_sentinels },
        Err(QueueError::Cancelled) => ProducerExit::Cancelled,
        Err(QueueError::Closed) => {
            warn!(crawler = id, "Queue closed during crawl");
            ProducerExit::Closed
        }
    };

    info!(crawler = id, exit = ?exit, "Crawler finished");
    exit
}
