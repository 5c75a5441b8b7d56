//! disk-crawler - Parallel Filesystem Crawler
//!
//! Crawls one or more directory trees and hands every discovered file to a
//! pool of indexer threads through a bounded queue. Indexers match file names
//! against a search term and count the hits; exactly one of them reports the
//! total once the crawl is over.
//!
//! # Features
//!
//! - **Bounded Memory**: Crawlers block on a fixed-capacity queue, so a huge
//!   tree never piles up in memory ahead of the indexers.
//!
//! - **Duplicate Suppression**: Files reachable through symlinks, hard links
//!   or overlapping roots are indexed once, keyed by device and inode.
//!
//! - **Sentinel Shutdown**: Typed `Continue`/`Final` sentinels stop every
//!   indexer and elect a single reporter without a coordinator thread.
//!
//! - **Deadline**: A run timeout cancels blocked queue operations and returns
//!   partial counts instead of hanging.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Crawler Threads                             │
//! │  ┌─────────┐  ┌─────────┐         ┌─────────┐                   │
//! │  │ Root 0  │  │ Root 1  │  ...    │ Root R  │   DirectoryLister  │
//! │  └────┬────┘  └────┬────┘         └────┬────┘   + dedup registry │
//! │       └────────────┼───────────────────┘                        │
//! │                    ▼                                            │
//! │            ┌──────────────────────────┐                         │
//! │            │     Work Queue           │                         │
//! │            │  (crossbeam bounded)     │                         │
//! │            │  - Backpressure support  │                         │
//! │            │  - Cancellable put/take  │                         │
//! │            └────────────┬─────────────┘                         │
//! │                         ▼                                       │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │Indexer 1│  │Indexer 2│  │Indexer 3│  ...    │Indexer N│     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       └────────────┴─────┬──────┴────────────────────┘          │
//! │                          ▼                                      │
//! │               Match ledger ──► Reporter (once)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Count and list files whose name contains "txt"
//! disk-crawler ~/projects --term txt
//!
//! # Two roots, 8 indexers, small queue, 60 second deadline
//! disk-crawler /data /backup -w 8 --queue-size 16 --timeout 60
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod fs;
pub mod progress;

pub use config::{CliArgs, CrawlConfig};
pub use crawler::{run, CrawlCoordinator, CrawlOutcome, CrawlProgress, RunStatus};
pub use error::{CrawlerError, Result};
