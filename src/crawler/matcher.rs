//! Entry predicates
//!
//! Two predicates shape a crawl:
//! - [`EntryFilter`] runs in the crawler and decides what gets enqueued
//!   (rejecting a directory prunes its subtree).
//! - [`EntryMatcher`] runs in the indexers and decides what counts as a hit.
//!
//! Both are implemented for plain closures.

use crate::fs::{ChildEntry, DiscoveredEntry};
use regex::Regex;
use std::sync::Arc;

/// Crawler-side filter over listed children
pub trait EntryFilter: Send + Sync {
    /// Return true to keep the entry (or descend into the directory)
    fn accept(&self, entry: &ChildEntry) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&ChildEntry) -> bool + Send + Sync,
{
    fn accept(&self, entry: &ChildEntry) -> bool {
        self(entry)
    }
}

/// Filter that keeps everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EntryFilter for AcceptAll {
    fn accept(&self, _entry: &ChildEntry) -> bool {
        true
    }
}

/// Filter that drops paths matching any exclude pattern
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    patterns: Vec<Regex>,
}

impl ExcludeFilter {
    /// Create from compiled patterns
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Check if a path matches an exclude pattern
    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }
}

impl EntryFilter for ExcludeFilter {
    fn accept(&self, entry: &ChildEntry) -> bool {
        !self.is_excluded(&entry.path.to_string_lossy())
    }
}

/// Indexer-side match predicate
pub trait EntryMatcher: Send + Sync {
    /// Return true if `entry` is a hit
    fn matches(&self, entry: &DiscoveredEntry) -> bool;
}

impl<F> EntryMatcher for F
where
    F: Fn(&DiscoveredEntry) -> bool + Send + Sync,
{
    fn matches(&self, entry: &DiscoveredEntry) -> bool {
        self(entry)
    }
}

/// Matches every entry (pure counting mode)
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAll;

impl EntryMatcher for MatchAll {
    fn matches(&self, _entry: &DiscoveredEntry) -> bool {
        true
    }
}

/// Case-insensitive substring match of a term against the file name
///
/// An empty term is a substring of every name and matches everything.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    term: String,
    needle: String,
}

impl TermMatcher {
    /// Create a matcher for `term`
    pub fn new(term: &str) -> Self {
        Self {
            term: term.to_string(),
            needle: term.to_lowercase(),
        }
    }

    /// The term as given
    pub fn term(&self) -> &str {
        &self.term
    }
}

impl EntryMatcher for TermMatcher {
    fn matches(&self, entry: &DiscoveredEntry) -> bool {
        entry.name.to_lowercase().contains(&self.needle)
    }
}

/// Pick the matcher for an optional search term
pub fn matcher_for(term: Option<&str>) -> Arc<dyn EntryMatcher> {
    match term {
        Some(term) => Arc::new(TermMatcher::new(term)),
        None => Arc::new(MatchAll),
    }
}
