//! disk-crawler - Parallel Filesystem Crawler
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use disk_crawler::config::{CliArgs, CrawlConfig};
use disk_crawler::crawler::{CountOnly, CrawlCoordinator, CrawlOutcome, IndexAction, LogReporter, Reporter, RunStatus};
use disk_crawler::progress::{print_header, print_summary, ConsoleReporter, PrintMatches, ProgressReporter};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(RunStatus::Completed) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunStatus> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = CrawlConfig::from_args(args).context("Invalid configuration")?;

    // Print header
    if config.show_progress {
        print_header(
            &config.roots,
            config.term.as_deref(),
            config.worker_count,
            config.queue_size,
        );
    }

    // Create progress reporter
    let progress = config.show_progress.then(ProgressReporter::new);

    let term = config.term.as_deref();
    let (action, reporter): (Arc<dyn IndexAction>, Arc<dyn Reporter>) = if config.json {
        (Arc::new(CountOnly), Arc::new(LogReporter))
    } else if !config.show_progress {
        (
            Arc::new(CountOnly),
            Arc::new(ConsoleReporter::new(term, &config.roots, None)),
        )
    } else {
        (
            Arc::new(PrintMatches::new(progress.clone())),
            Arc::new(ConsoleReporter::new(term, &config.roots, progress.clone())),
        )
    };

    let json = config.json;
    let coordinator = CrawlCoordinator::new(config)
        .context("Failed to initialize crawler")?
        .with_action(action)
        .with_reporter(reporter);

    // Setup signal handler for graceful shutdown
    let cancel = coordinator.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        cancel.cancel();
    })
    .context("Failed to set signal handler")?;

    // Run the crawl
    let outcome = match &progress {
        Some(p) => {
            let p = p.clone();
            coordinator.run_with_progress(move |update| p.update(&update))
        }
        None => coordinator.run(),
    }
    .context("Crawl failed")?;

    // Finish progress
    if let Some(ref p) = progress {
        match outcome.status {
            RunStatus::Completed => p.finish("Crawl completed"),
            RunStatus::TimedOut => p.finish("Crawl timed out"),
            RunStatus::Cancelled => p.finish("Crawl interrupted"),
        }
    }

    report_outcome(&outcome, json)?;
    Ok(outcome.status)
}

fn report_outcome(outcome: &CrawlOutcome, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(outcome).context("Failed to serialize outcome")?;
        println!("{}", out);
    } else {
        print_summary(outcome);
    }

    match outcome.status {
        RunStatus::Completed => {}
        RunStatus::TimedOut => warn!(
            partial = outcome.matched_count,
            "Crawl timed out before completion"
        ),
        RunStatus::Cancelled => info!(
            partial = outcome.matched_count,
            "Crawl was interrupted before completion"
        ),
    }

    if outcome.crawl.errors > 0 {
        info!(errors = outcome.crawl.errors, "Crawl completed with skipped entries");
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("disk_crawler=debug,warn")
    } else {
        EnvFilter::new("disk_crawler=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
