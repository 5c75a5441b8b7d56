//! Producer/consumer crawl pipeline
//!
//! ```text
//!  Crawler 0 ─┐                              ┌─► Indexer 0 ─┐
//!  Crawler 1 ─┼─► dedup ─► [ BoundedQueue ] ─┼─► Indexer 1 ─┼─► MatchLedger ─► Reporter
//!  Crawler R ─┘             (capacity C)     └─► Indexer N ─┘      (once)
//! ```
//!
//! Crawlers walk their roots depth-first and block on a full queue. When the
//! last crawler finishes it enqueues N-1 `Continue` sentinels and one `Final`.
//! Each indexer exits on the first sentinel it takes; the one holding `Final`
//! waits for the others and emits the single report.

pub mod cancel;
pub mod coordinator;
pub mod dedup;
pub mod matcher;
pub mod producer;
pub mod queue;
pub mod report;
pub mod shutdown;
pub mod worker;

pub use cancel::CancelToken;
pub use coordinator::{run, CrawlCoordinator, CrawlOutcome, CrawlProgress, RunStatus};
pub use dedup::{DedupRegistry, SeenSet, SharedDedupRegistry};
pub use matcher::{matcher_for, AcceptAll, EntryFilter, EntryMatcher, ExcludeFilter, MatchAll, TermMatcher};
pub use producer::{CrawlOptions, CrawlStats, CrawlSummary, Crawler, Producer, ProducerExit};
pub use queue::{BoundedQueue, QueueReceiver, QueueSender, QueueStats, QueueSummary, WorkItem};
pub use report::{CountOnly, IndexAction, LogReporter, MatchLedger, MatchRecord, Report, Reporter};
pub use worker::{Indexer, IndexerContext, IndexerState};
