//! Configuration types for disk-crawler
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::crawler::queue::MIN_QUEUE_CAPACITY;
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Default work queue capacity
pub const DEFAULT_QUEUE_SIZE: usize = 10;

/// Default deadline for a whole run
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Parallel filesystem crawler that counts and lists matching files
#[derive(Parser, Debug, Clone)]
#[command(
    name = "disk-crawler",
    version,
    about = "Parallel filesystem crawler that counts and lists matching files",
    long_about = "Crawls one or more directory trees with a producer per root and a pool of\n\
                  indexer threads fed through a bounded queue. Every file whose name contains\n\
                  the search term (case-insensitive) is listed and counted; without a term\n\
                  every file is counted.",
    after_help = "EXAMPLES:\n    \
        disk-crawler ~/projects --term txt\n    \
        disk-crawler /data /backup -w 8 --queue-size 64 --timeout 60\n    \
        disk-crawler /srv --exclude '\\.git' --exclude node_modules --max-depth 6\n    \
        disk-crawler /tmp --term log --json > matches.json"
)]
pub struct CliArgs {
    /// Directories to crawl
    #[arg(value_name = "ROOT", required = true, num_args = 1..)]
    pub roots: Vec<PathBuf>,

    /// Case-insensitive substring to look for in file names (all files if omitted)
    #[arg(short = 't', long, value_name = "TERM")]
    pub term: Option<String>,

    /// Number of indexer threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Work queue capacity (bounds memory between crawlers and indexers)
    #[arg(long, default_value_t = DEFAULT_QUEUE_SIZE, value_name = "NUM")]
    pub queue_size: usize,

    /// Give up after this many seconds and report partial results
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
    pub timeout: u64,

    /// Maximum directory depth (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Descend into symlinked directories
    #[arg(short = 'L', long)]
    pub follow_links: bool,

    /// Simulated per-file processing cost: random pause up to this many milliseconds
    #[arg(long, default_value = "0", value_name = "MS")]
    pub delay_ms: u64,

    /// Print the outcome as JSON instead of the console summary
    #[arg(long)]
    pub json: bool,

    /// Quiet mode - suppress progress and per-match output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show skipped entries and thread lifecycle)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Root directories, one crawler each
    pub roots: Vec<PathBuf>,

    /// Search term; `None` counts every file
    pub term: Option<String>,

    /// Number of indexer threads (N)
    pub worker_count: usize,

    /// Work queue capacity (C)
    pub queue_size: usize,

    /// Deadline for the whole run
    pub timeout: Duration,

    /// Maximum traversal depth
    pub max_depth: Option<usize>,

    /// Descend into symlinked directories
    pub follow_links: bool,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Upper bound of the simulated per-file cost
    pub delay: Option<Duration>,

    /// Show progress indicator and per-match lines
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,

    /// Emit JSON output
    pub json: bool,
}

impl CrawlConfig {
    /// Create a configuration with defaults for `roots`
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            term: None,
            worker_count: default_workers(),
            queue_size: DEFAULT_QUEUE_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_depth: None,
            follow_links: false,
            exclude_patterns: Vec::new(),
            delay: None,
            show_progress: false,
            verbose: false,
            json: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        // Roots must be existing directories
        for root in &args.roots {
            if !root.exists() {
                return Err(ConfigError::RootNotFound { path: root.clone() });
            }
            if !root.is_dir() {
                return Err(ConfigError::RootNotDirectory { path: root.clone() });
            }
        }

        // Compile exclude patterns
        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            roots: args.roots,
            term: args.term,
            worker_count: args.workers,
            queue_size: args.queue_size,
            timeout: Duration::from_secs(args.timeout),
            max_depth: args.max_depth,
            follow_links: args.follow_links,
            exclude_patterns,
            delay: (args.delay_ms > 0).then(|| Duration::from_millis(args.delay_ms)),
            show_progress: !args.quiet && !args.json,
            verbose: args.verbose,
            json: args.json,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the limits every run depends on
    ///
    /// Root existence is not checked here so that custom listers can crawl
    /// trees that do not live on the local filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }

        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
                max: MAX_WORKERS,
            });
        }

        if self.queue_size < MIN_QUEUE_CAPACITY {
            return Err(ConfigError::InvalidQueueSize {
                size: self.queue_size,
                min: MIN_QUEUE_CAPACITY,
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(roots: Vec<PathBuf>) -> CliArgs {
        CliArgs::parse_from(
            std::iter::once("disk-crawler".to_string())
                .chain(roots.iter().map(|r| r.display().to_string())),
        )
    }

    #[test]
    fn test_cli_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CrawlConfig::from_args(args(vec![dir.path().to_path_buf()])).unwrap();

        assert_eq!(config.queue_size, DEFAULT_QUEUE_SIZE);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.worker_count >= 1);
        assert!(config.term.is_none());
        assert!(config.delay.is_none());
        assert!(config.show_progress);
    }

    #[test]
    fn test_cli_flags() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().display().to_string();
        let cli = CliArgs::parse_from([
            "disk-crawler",
            root.as_str(),
            "--term",
            "txt",
            "-w",
            "4",
            "--queue-size",
            "32",
            "--timeout",
            "5",
            "--delay-ms",
            "20",
            "--exclude",
            r"\.git",
            "--json",
        ]);
        let config = CrawlConfig::from_args(cli).unwrap();

        assert_eq!(config.term.as_deref(), Some("txt"));
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_size, 32);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.delay, Some(Duration::from_millis(20)));
        assert!(config.json);
        assert!(!config.show_progress);
        assert_eq!(config.exclude_patterns.len(), 1);
        assert!(config.exclude_patterns[0].is_match("/repo/.git/HEAD"));
    }

    #[test]
    fn test_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            CrawlConfig::from_args(args(vec![missing])),
            Err(ConfigError::RootNotFound { .. })
        ));
    }

    #[test]
    fn test_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            CrawlConfig::from_args(args(vec![file])),
            Err(ConfigError::RootNotDirectory { .. })
        ));
    }

    #[test]
    fn test_validate_limits() {
        let mut config = CrawlConfig::new(vec![PathBuf::from("/data")]);
        assert!(config.validate().is_ok());

        config.worker_count = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkerCount { count: 0, .. })
        ));

        config.worker_count = 2;
        config.queue_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQueueSize { size: 0, .. })
        ));

        config.queue_size = 10;
        config.timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));

        config.timeout = Duration::from_secs(1);
        config.roots.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoRoots)));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let mut cli = args(vec![dir.path().to_path_buf()]);
        cli.exclude_patterns.push("(".into());
        assert!(matches!(
            CrawlConfig::from_args(cli),
            Err(ConfigError::InvalidExcludePattern { .. })
        ));
    }
}
