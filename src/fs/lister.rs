//! Directory enumeration
//!
//! The crawler only needs "list the children of a directory". That
//! capability is a trait so tests can substitute synthetic trees and so the
//! crawl core never touches `std::fs` directly.

use crate::error::{ListError, ListResult};
use crate::fs::types::{ChildEntry, DedupKey, EntryKind, Listing};
use std::fs;
use std::path::Path;
use tracing::trace;

/// Lists the children of a directory
///
/// Implementations must be shareable across producer threads.
pub trait DirectoryLister: Send + Sync {
    /// List the children of `path`
    ///
    /// Fails only if the directory itself cannot be opened. Children that
    /// cannot be inspected are reported in [`Listing::errors`].
    fn list_children(&self, path: &Path) -> ListResult<Listing>;

    /// Resolve the identity of a directory (used for cycle detection)
    fn identify(&self, path: &Path) -> ListResult<DedupKey>;
}

/// Lister backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLister;

impl LocalLister {
    /// Create a local lister
    pub fn new() -> Self {
        Self
    }

    fn inspect(&self, dirent: &fs::DirEntry) -> ListResult<ChildEntry> {
        let path = dirent.path();
        let name = dirent.file_name().to_string_lossy().into_owned();

        let file_type = dirent
            .file_type()
            .map_err(|e| ListError::from_io(&path, e))?;
        let is_symlink = file_type.is_symlink();

        // Follow links so the key names the target, not the link
        match fs::metadata(&path) {
            Ok(meta) => {
                let identity = DedupKey::resolve(&path, &meta)
                    .map_err(|e| ListError::from_io(&path, e))?;
                Ok(ChildEntry {
                    name,
                    kind: EntryKind::from_metadata(&meta),
                    is_symlink,
                    size: meta.len(),
                    identity: Some(identity),
                    path,
                })
            }
            Err(e) if is_symlink && e.kind() == std::io::ErrorKind::NotFound => {
                trace!(path = %path.display(), "Broken symlink");
                Ok(ChildEntry {
                    name,
                    path,
                    kind: EntryKind::BrokenLink,
                    is_symlink,
                    size: 0,
                    identity: None,
                })
            }
            Err(e) => Err(ListError::from_io(&path, e)),
        }
    }
}

impl DirectoryLister for LocalLister {
    fn list_children(&self, path: &Path) -> ListResult<Listing> {
        let read_dir = fs::read_dir(path).map_err(|e| ListError::from_io(path, e))?;

        let mut listing = Listing::default();
        for dirent in read_dir {
            let dirent = match dirent {
                Ok(d) => d,
                Err(e) => {
                    listing.errors.push(ListError::from_io(path, e));
                    continue;
                }
            };

            match self.inspect(&dirent) {
                Ok(child) => listing.entries.push(child),
                Err(e) => listing.errors.push(e),
            }
        }

        Ok(listing)
    }

    fn identify(&self, path: &Path) -> ListResult<DedupKey> {
        let meta = fs::metadata(path).map_err(|e| ListError::from_io(path, e))?;
        DedupKey::resolve(path, &meta).map_err(|e| ListError::from_io(path, e))
    }
}
