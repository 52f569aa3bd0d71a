//! Filesystem abstraction used by [`crate::FolderStore`].
//!
//! The store never touches `std::fs` or `tokio::fs` directly. Keeping I/O behind this trait means
//! the whole store can be exercised against the in-memory `MemoryFs` (behind the `test-util`
//! feature) without a disk, while production uses [`LocalFs`].

use async_trait::async_trait;
use std::io;
use std::path::Path;

mod local;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use local::LocalFs;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{FsOp, MemoryFs};

/// Kind of a node in the tree. Symlinks are never followed and report as [`EntryKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// Primitive filesystem operations.
///
/// All implementations must be thread-safe (Send + Sync) for use across request handlers.
/// Errors use [`io::ErrorKind`] the way the host OS would, in particular
/// [`io::ErrorKind::NotFound`] for missing paths.
#[async_trait]
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Create a directory and any missing ancestors. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create or truncate a file with `data`. The parent directory must exist.
    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Rename `from` to `to`, replacing an existing file at `to` atomically.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Read a whole file.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Remove a single file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and everything beneath it.
    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Kind of the node at `path`, or `None` if nothing is there.
    async fn kind(&self, path: &Path) -> io::Result<Option<EntryKind>>;

    /// Direct children of a directory as `(name, kind)` pairs, in no particular order.
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<(String, EntryKind)>>;
}
