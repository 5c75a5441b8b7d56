//! Filesystem access module
//!
//! Provides the directory enumeration capability the crawler depends on.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 DirectoryLister                     │
//! │  - list_children(path) -> Listing                   │
//! │  - per-entry failures reported, never fatal         │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                   LocalLister                       │
//! │  - std::fs::read_dir + metadata (follows links)     │
//! │  - DedupKey from (dev, inode) of the resolved target│
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod lister;
pub mod types;

pub use lister::{DirectoryLister, LocalLister};
pub use types::{ChildEntry, DedupKey, DiscoveredEntry, EntryKind, Listing};
