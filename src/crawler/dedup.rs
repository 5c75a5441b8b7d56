//! Duplicate suppression for one crawl
//!
//! The registry remembers the identity of every entry already enqueued, so a
//! file reachable through several paths (symlinks, hard links, overlapping
//! roots) is indexed once.
//!
//! A single crawler owns a [`DedupRegistry`] outright; `&mut self` makes the
//! single-writer rule a compile-time property. When several roots are crawled
//! in parallel they share a [`SharedDedupRegistry`], which serializes access
//! behind a mutex.

use crate::fs::DedupKey;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of identities already submitted during a crawl
pub trait SeenSet: Send {
    /// Record `key` and return true if it was not seen before
    ///
    /// Returns false, without side effects, for a key already recorded.
    fn mark_and_check(&mut self, key: &DedupKey) -> bool;
}

/// Registry owned by a single crawler
#[derive(Debug, Default)]
pub struct DedupRegistry {
    seen: HashSet<DedupKey>,
}

impl DedupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys recorded
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if no key has been recorded
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Check if `key` was recorded
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }
}

impl SeenSet for DedupRegistry {
    fn mark_and_check(&mut self, key: &DedupKey) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.clone())
    }
}

/// Registry shared by several concurrent crawlers
#[derive(Debug, Clone, Default)]
pub struct SharedDedupRegistry {
    inner: Arc<Mutex<DedupRegistry>>,
}

impl SharedDedupRegistry {
    /// Create an empty shared registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys recorded
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if no key has been recorded
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl SeenSet for SharedDedupRegistry {
    fn mark_and_check(&mut self, key: &DedupKey) -> bool {
        self.inner.lock().mark_and_check(key)
    }
}
