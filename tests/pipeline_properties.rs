//! Property tests for the shutdown protocol and duplicate suppression
//!
//! Runs the full pipeline over a synthetic tree so the cases stay fast.

use disk_crawler::config::CrawlConfig;
use disk_crawler::crawler::{CrawlCoordinator, Report, RunStatus};
use disk_crawler::error::ListResult;
use disk_crawler::fs::{ChildEntry, DedupKey, DirectoryLister, EntryKind, Listing};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Flat roots `/root-<r>` whose files carry explicit inode numbers
struct SyntheticTree {
    dirs: HashMap<PathBuf, Vec<ChildEntry>>,
}

impl SyntheticTree {
    fn new(roots: &[Vec<u64>]) -> Self {
        let dirs = roots
            .iter()
            .enumerate()
            .map(|(r, inodes)| {
                let dir = PathBuf::from(format!("/root-{r}"));
                let children = inodes
                    .iter()
                    .enumerate()
                    .map(|(i, ino)| ChildEntry {
                        name: format!("f{i}.dat"),
                        path: dir.join(format!("f{i}.dat")),
                        kind: EntryKind::File,
                        is_symlink: false,
                        size: 1,
                        identity: Some(DedupKey::Inode { dev: 1, ino: *ino }),
                    })
                    .collect();
                (dir, children)
            })
            .collect();
        Self { dirs }
    }

    fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.dirs.keys().cloned().collect();
        roots.sort();
        roots
    }
}

impl DirectoryLister for SyntheticTree {
    fn list_children(&self, path: &Path) -> ListResult<Listing> {
        Ok(Listing {
            entries: self.dirs.get(path).cloned().unwrap_or_default(),
            errors: Vec::new(),
        })
    }

    fn identify(&self, path: &Path) -> ListResult<DedupKey> {
        Ok(DedupKey::Path(path.to_path_buf()))
    }
}

fn roots_strategy() -> impl Strategy<Value = Vec<Vec<u64>>> {
    // Small inode space so roots overlap and duplicates are common
    prop::collection::vec(prop::collection::vec(0u64..40, 0..30), 1..4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn sentinel_fan_out_and_single_report(
        roots in roots_strategy(),
        workers in 1usize..=64,
        queue_size in 1usize..16,
    ) {
        let tree = Arc::new(SyntheticTree::new(&roots));
        let distinct: HashSet<u64> = roots.iter().flatten().copied().collect();

        let mut config = CrawlConfig::new(tree.roots());
        config.worker_count = workers;
        config.queue_size = queue_size;
        config.timeout = Duration::from_secs(30);

        let reports = Arc::new(Mutex::new(Vec::<u64>::new()));
        let sink = Arc::clone(&reports);

        let outcome = CrawlCoordinator::new(config)
            .unwrap()
            .with_lister(tree)
            .with_reporter(Arc::new(move |r: &Report| sink.lock().push(r.matched_count)))
            .run()
            .unwrap();

        prop_assert_eq!(outcome.status, RunStatus::Completed);
        prop_assert_eq!(outcome.queue.continue_sent, workers as u64 - 1);
        prop_assert_eq!(outcome.queue.final_sent, 1);
        prop_assert_eq!(outcome.reports_emitted, 1);
        prop_assert!(outcome.queue.high_water_mark <= queue_size);

        prop_assert_eq!(outcome.matched_count, distinct.len() as u64);
        prop_assert_eq!(outcome.crawl.enqueued, distinct.len() as u64);

        let reports = reports.lock();
        prop_assert_eq!(reports.as_slice(), &[distinct.len() as u64]);
    }
}
