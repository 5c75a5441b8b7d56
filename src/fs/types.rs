//! Filesystem entry types
//!
//! These types describe what a directory listing returns and what the
//! crawler hands to the indexers.

use serde::Serialize;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Type of filesystem entry (after following a symlink, if any)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link whose target could not be resolved
    BrokenLink,
    /// Device, socket, FIFO, ...
    Other,
}

impl EntryKind {
    /// Classify resolved metadata
    pub fn from_metadata(meta: &Metadata) -> Self {
        let ft = meta.file_type();
        if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryKind::Directory
    }

    /// Check if this is a regular file
    pub fn is_file(&self) -> bool {
        *self == EntryKind::File
    }
}

/// Identity of an entry's resolved target
///
/// Two paths that resolve to the same file (symlinks, hard links,
/// overlapping roots) produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum DedupKey {
    /// Device and inode number of the resolved target
    Inode { dev: u64, ino: u64 },
    /// Canonical path, for platforms without stable inode numbers
    Path(PathBuf),
}

impl DedupKey {
    /// Derive the key for `path` from its resolved metadata
    #[cfg(unix)]
    pub fn resolve(_path: &Path, meta: &Metadata) -> std::io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        Ok(DedupKey::Inode {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    /// Derive the key for `path` from its resolved metadata
    #[cfg(not(unix))]
    pub fn resolve(path: &Path, _meta: &Metadata) -> std::io::Result<Self> {
        std::fs::canonicalize(path).map(DedupKey::Path)
    }
}

/// One child of a listed directory
#[derive(Debug, Clone)]
pub struct ChildEntry {
    /// File name (lossy UTF-8)
    pub name: String,

    /// Full path as discovered (not resolved)
    pub path: PathBuf,

    /// Kind of the resolved target
    pub kind: EntryKind,

    /// Whether the entry itself is a symbolic link
    pub is_symlink: bool,

    /// Size of the resolved target in bytes
    pub size: u64,

    /// Identity of the resolved target (`None` for broken links)
    pub identity: Option<DedupKey>,
}

impl ChildEntry {
    /// Check if the resolved target is a directory
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// An entry accepted by the crawler and handed to the indexers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredEntry {
    /// Full path as discovered
    pub path: PathBuf,

    /// File name used for matching
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Resolved identity used for duplicate suppression
    #[serde(skip)]
    pub key: DedupKey,
}

impl DiscoveredEntry {
    /// Build from a listed child, if its target could be identified
    pub fn from_child(child: &ChildEntry) -> Option<Self> {
        child.identity.clone().map(|key| Self {
            path: child.path.clone(),
            name: child.name.clone(),
            size: child.size,
            key,
        })
    }
}

/// Per-directory listing result
///
/// Entries that could not be inspected are reported in `errors` rather than
/// failing the whole listing.
#[derive(Debug, Default)]
pub struct Listing {
    /// Children that were inspected successfully
    pub entries: Vec<ChildEntry>,

    /// Children that were skipped
    pub errors: Vec<crate::error::ListError>,
}
