//! Integration tests for disk-crawler
//!
//! These tests crawl real temporary directory trees end to end.

use disk_crawler::config::CrawlConfig;
use disk_crawler::crawler::{run, CrawlCoordinator, MatchRecord, Report, RunStatus};
use disk_crawler::error::CrawlerError;
use parking_lot::Mutex;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, name.as_bytes()).unwrap();
    path
}

fn config(roots: Vec<PathBuf>, workers: usize, queue_size: usize) -> CrawlConfig {
    let mut config = CrawlConfig::new(roots);
    config.worker_count = workers;
    config.queue_size = queue_size;
    config.timeout = Duration::from_secs(30);
    config
}

#[test]
fn test_empty_directory_reports_zero() {
    let dir = tempdir().unwrap();
    let reports = Arc::new(Mutex::new(Vec::<Report>::new()));
    let sink = Arc::clone(&reports);

    let mut cfg = config(vec![dir.path().to_path_buf()], 3, 4);
    cfg.term = Some(String::new());

    let outcome = CrawlCoordinator::new(cfg)
        .unwrap()
        .with_reporter(Arc::new(move |r: &Report| sink.lock().push(r.clone())))
        .run()
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.matched_count, 0);

    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].no_results_notice().is_some());
}

#[test]
fn test_term_matches_case_insensitively() {
    let dir = tempdir().unwrap();
    for name in ["a.txt", "b.txt", "A.TXT", "c.log", "d.txt"] {
        touch(dir.path(), name);
    }

    let outcome = run(
        vec![dir.path().to_path_buf()],
        Some("txt"),
        2,
        3,
        Duration::from_secs(30),
    )
    .unwrap();

    assert_eq!(outcome.matched_count, 4);
    assert!(outcome
        .matches
        .iter()
        .all(|m| m.path.to_string_lossy().to_lowercase().ends_with(".txt")));
}

#[test]
fn test_hundred_files_four_workers() {
    let dir = tempdir().unwrap();
    for i in 0..100 {
        let sub = dir.path().join(format!("d{}", i % 7));
        fs::create_dir_all(&sub).unwrap();
        touch(&sub, &format!("file-{i}.dat"));
    }

    let outcome = run(
        vec![dir.path().to_path_buf()],
        None,
        4,
        10,
        Duration::from_secs(30),
    )
    .unwrap()
    .into_complete()
    .unwrap();

    assert_eq!(outcome.matched_count, 100);
    assert_eq!(outcome.crawl.enqueued, 100);
    assert_eq!(outcome.crawl.dirs_listed, 8);
    assert_eq!(outcome.queue.continue_sent, 3);
    assert_eq!(outcome.queue.final_sent, 1);
    assert_eq!(outcome.reports_emitted, 1);
    assert!(outcome.queue.high_water_mark <= 10);
    assert!(outcome.elapsed < Duration::from_secs(30));
}

#[test]
fn test_ordinals_are_dense() {
    let dir = tempdir().unwrap();
    for i in 0..40 {
        touch(dir.path(), &format!("{i}.txt"));
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let outcome = CrawlCoordinator::new(config(vec![dir.path().to_path_buf()], 5, 2))
        .unwrap()
        .with_action(Arc::new(move |r: &MatchRecord| sink.lock().push(r.ordinal)))
        .run()
        .unwrap();

    let mut ordinals = seen.lock().clone();
    ordinals.sort_unstable();
    assert_eq!(ordinals, (1..=40).collect::<Vec<u64>>());
    assert_eq!(outcome.matched_count, 40);
}

#[cfg(unix)]
#[test]
fn test_two_roots_linking_one_file_count_once() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let target = touch(first.path(), "shared.bin");
    std::os::unix::fs::symlink(&target, second.path().join("alias.bin")).unwrap();

    let outcome = run(
        vec![first.path().to_path_buf(), second.path().to_path_buf()],
        None,
        3,
        2,
        Duration::from_secs(30),
    )
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.matched_count, 1);
    assert_eq!(outcome.crawl.duplicates, 1);
    assert_eq!(outcome.queue.continue_sent, 2);
    assert_eq!(outcome.queue.final_sent, 1);
}

#[cfg(unix)]
#[test]
fn test_hard_links_count_once() {
    let dir = tempdir().unwrap();
    let original = touch(dir.path(), "report.txt");
    fs::hard_link(&original, dir.path().join("report-copy.txt")).unwrap();

    let outcome = run(
        vec![dir.path().to_path_buf()],
        Some("report"),
        2,
        4,
        Duration::from_secs(30),
    )
    .unwrap();

    assert_eq!(outcome.matched_count, 1);
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_not_followed_by_default() {
    let dir = tempdir().unwrap();
    let real = dir.path().join("real");
    fs::create_dir(&real).unwrap();
    touch(&real, "inside.txt");
    std::os::unix::fs::symlink(&real, dir.path().join("loop")).unwrap();
    std::os::unix::fs::symlink(dir.path(), real.join("back-to-root")).unwrap();

    let outcome = run(vec![dir.path().to_path_buf()], None, 2, 4, Duration::from_secs(30)).unwrap();
    assert_eq!(outcome.matched_count, 1);
    assert_eq!(outcome.crawl.skipped_dirs, 2);

    let mut cfg = config(vec![dir.path().to_path_buf()], 2, 4);
    cfg.follow_links = true;
    let outcome = CrawlCoordinator::new(cfg).unwrap().run().unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.matched_count, 1);
}

#[test]
fn test_exclude_and_max_depth() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "top.txt");
    let git = dir.path().join(".git");
    fs::create_dir(&git).unwrap();
    touch(&git, "HEAD.txt");
    let deep = dir.path().join("a").join("b");
    fs::create_dir_all(&deep).unwrap();
    touch(&dir.path().join("a"), "mid.txt");
    touch(&deep, "deep.txt");

    let mut cfg = config(vec![dir.path().to_path_buf()], 2, 4);
    cfg.exclude_patterns = vec![Regex::new(r"\.git").unwrap()];
    cfg.max_depth = Some(1);

    let outcome = CrawlCoordinator::new(cfg).unwrap().run().unwrap();
    let mut names: Vec<String> = outcome
        .matches
        .iter()
        .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names, vec!["mid.txt", "top.txt"]);
    assert_eq!(outcome.crawl.filtered, 1);
}

#[test]
fn test_timeout_with_stalled_indexer() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "slow.txt");

    let mut cfg = config(vec![dir.path().to_path_buf()], 1, 4);
    cfg.timeout = Duration::from_millis(200);

    let outcome = CrawlCoordinator::new(cfg)
        .unwrap()
        .with_action(Arc::new(|_: &MatchRecord| thread::sleep(Duration::from_secs(3))))
        .with_grace_period(Duration::from_millis(50))
        .run()
        .unwrap();

    assert_eq!(outcome.status, RunStatus::TimedOut);
    assert_eq!(outcome.matched_count, 1);
    assert_eq!(outcome.reports_emitted, 0);
    assert_eq!(outcome.abandoned_tasks, 1);
    assert!(matches!(
        outcome.into_complete(),
        Err(CrawlerError::TimedOut { partial_count: 1, .. })
    ));
}

#[test]
fn test_cancel_unblocks_producer_on_full_queue() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        touch(dir.path(), &format!("{i}.txt"));
    }

    let coordinator = CrawlCoordinator::new(config(vec![dir.path().to_path_buf()], 1, 1)).unwrap();
    let cancel = coordinator.cancel_token();

    // The single indexer stalls on its first match until cancelled
    let stall = cancel.clone();
    let coordinator = coordinator.with_action(Arc::new(move |_: &MatchRecord| {
        while !stall.is_cancelled() {
            thread::sleep(Duration::from_millis(5));
        }
    }));

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        cancel.cancel();
    });

    let outcome = coordinator.run().unwrap();
    canceller.join().unwrap();

    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert_eq!(outcome.abandoned_tasks, 0);
    assert_eq!(outcome.reports_emitted, 0);
    assert!(outcome.matched_count < 20);
    assert!(outcome.queue.backpressure_events > 0);
    assert!(outcome.elapsed < Duration::from_secs(10));
}

#[test]
fn test_run_with_progress_reports_updates() {
    let dir = tempdir().unwrap();
    for i in 0..10 {
        touch(dir.path(), &format!("{i}.log"));
    }

    let updates = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&updates);

    let outcome = CrawlCoordinator::new(config(vec![dir.path().to_path_buf()], 2, 4))
        .unwrap()
        .run_with_progress(move |p| {
            assert_eq!(p.queue_capacity, 4);
            *counter.lock() += 1;
        })
        .unwrap();

    assert_eq!(outcome.matched_count, 10);
    assert!(*updates.lock() >= 1);
}

#[test]
fn test_outcome_serializes_to_json() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "x.txt");

    let outcome = run(vec![dir.path().to_path_buf()], Some("x"), 1, 1, Duration::from_secs(30)).unwrap();
    let json: serde_json::Value = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["matched_count"], 1);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["matches"][0]["ordinal"], 1);
}
