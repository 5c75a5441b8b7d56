//! Console output for the crawler
//!
//! Provides the progress spinner, per-match lines, the report printed by the
//! indexer that receives the final sentinel, and the end-of-run summary.

use crate::crawler::report::{IndexAction, MatchRecord, Report, Reporter};
use crate::crawler::{CrawlOutcome, CrawlProgress, RunStatus};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Progress reporter that displays crawl status
#[derive(Clone)]
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &CrawlProgress) {
        let msg = format!(
            "Dirs: {} | Queued: {} | Matched: {} | Rate: {:.0}/s | Queue: {}/{}",
            format_number(progress.dirs),
            format_number(progress.enqueued),
            format_number(progress.matched),
            progress.entries_per_second(),
            progress.queue_len,
            progress.queue_capacity,
        );

        self.bar.set_message(msg);
    }

    /// Print a line above the spinner
    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints `"<n>. Found <path>"` for every match
#[derive(Clone, Default)]
pub struct PrintMatches {
    progress: Option<ProgressReporter>,
}

impl PrintMatches {
    /// Print to stdout, or above `progress` when a spinner is active
    pub fn new(progress: Option<ProgressReporter>) -> Self {
        Self { progress }
    }
}

impl IndexAction for PrintMatches {
    fn on_match(&self, record: &MatchRecord) {
        let line = format_match(record.ordinal, &record.path);
        match &self.progress {
            Some(p) => p.println(&line),
            None => println!("{}", line),
        }
    }
}

/// Prints the aggregate report when the final sentinel is processed
#[derive(Clone)]
pub struct ConsoleReporter {
    term: Option<String>,
    roots: Vec<PathBuf>,
    progress: Option<ProgressReporter>,
}

impl ConsoleReporter {
    /// Name `term` and `roots` in the report line
    pub fn new(term: Option<&str>, roots: &[PathBuf], progress: Option<ProgressReporter>) -> Self {
        Self {
            term: term.map(str::to_string),
            roots: roots.to_vec(),
            progress,
        }
    }

    fn lines(&self, report: &Report) -> Vec<String> {
        let term = match &self.term {
            Some(term) => format!("\"{}\"", term),
            None => "<all files>".to_string(),
        };

        let mut lines = vec![format!(
            "{} for {} in {}: {} ({})",
            style("Total matches").green().bold(),
            term,
            join_roots(&self.roots),
            format_number(report.matched_count),
            format_size(report.matched_bytes, BINARY)
        )];
        if let Some(notice) = report.no_results_notice() {
            lines.push(style(notice).yellow().to_string());
        }
        lines
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, report: &Report) {
        for line in self.lines(report) {
            match &self.progress {
                Some(p) => p.println(&line),
                None => println!("{}", line),
            }
        }
    }
}

fn join_roots(roots: &[PathBuf]) -> String {
    roots
        .iter()
        .map(|r| r.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format one match line
pub fn format_match(ordinal: u64, path: &Path) -> String {
    format!("{}. Found {}", ordinal, path.display())
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the crawl outcome
pub fn print_summary(outcome: &CrawlOutcome) {
    let duration_secs = outcome.elapsed.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        outcome.crawl.enqueued as f64 / duration_secs
    } else {
        0.0
    };

    let title = match outcome.status {
        RunStatus::Completed => style("Crawl Complete").green().bold(),
        RunStatus::TimedOut => style("Crawl Timed Out (partial results)").yellow().bold(),
        RunStatus::Cancelled => style("Crawl Cancelled (partial results)").yellow().bold(),
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(outcome.crawl.dirs_listed)
    );
    println!(
        "  {} {}",
        style("Files queued:").bold(),
        format_number(outcome.crawl.enqueued)
    );
    println!(
        "  {} {} ({})",
        style("Matches:").bold(),
        format_number(outcome.matched_count),
        format_size(outcome.matched_bytes, BINARY)
    );
    if outcome.crawl.duplicates > 0 {
        println!(
            "  {} {}",
            style("Duplicates:").bold(),
            format_number(outcome.crawl.duplicates)
        );
    }
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!(
        "  {} {} waits, peak {}/{}",
        style("Queue:").bold(),
        format_number(outcome.queue.backpressure_events),
        outcome.queue.high_water_mark,
        outcome.queue.capacity
    );
    if outcome.crawl.errors > 0 {
        println!(
            "  {} {}",
            style("Skipped (errors):").yellow().bold(),
            format_number(outcome.crawl.errors)
        );
    }
    if outcome.abandoned_tasks > 0 {
        println!(
            "  {} {}",
            style("Abandoned tasks:").yellow().bold(),
            outcome.abandoned_tasks
        );
    }
    println!();
}

/// Print a header at the start of the crawl
pub fn print_header(roots: &[PathBuf], term: Option<&str>, workers: usize, queue_size: usize) {
    let roots = join_roots(roots);

    println!();
    println!(
        "{} {}",
        style("disk-crawler").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Roots:").bold(), roots);
    println!("  {} {}", style("Term:").bold(), term.unwrap_or("<all files>"));
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Queue size:").bold(), queue_size);
    println!();
}
