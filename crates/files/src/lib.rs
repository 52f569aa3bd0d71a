//! Image Store File Storage
//!
//! This crate provides the folder-scoped file store behind the image store HTTP API.
//!
//! ## Storage Model
//!
//! A single root directory holds one subdirectory per folder; each entry is a regular file
//! inside its folder:
//!
//! ```text
//! <root>/
//! ├── <folder>/
//! │   ├── <filename>
//! │   └── .upload-<uuid>.tmp   # in-flight write, renamed into place
//! └── .trash-<uuid>/           # folder being purged by delete-all
//! ```
//!
//! - Folders are created lazily by the first write and removed only by an explicit delete-all
//! - Filenames are unique within a folder, not globally
//! - There is no metadata, cache or history: the tree on disk is the whole state
//! - All filesystem access goes through [`FileSystem`], so the store can run against
//!   [`LocalFs`] in production and `MemoryFs` (enabled by the `test-util` feature) in tests
//!
//! ## Example Usage
//!
//! ```no_run
//! use imgstore_files::{FileName, FolderName, FolderStore, LocalFs};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FolderStore::open(Arc::new(LocalFs), "images").await?;
//!
//! let folder = FolderName::parse("cats")?;
//! let file = FileName::parse("tom.png")?;
//! store.create(&folder, &file, b"\x89PNG...").await?;
//! assert_eq!(store.count(&folder).await?, 1);
//! # Ok(())
//! # }
//! ```

mod constants;
mod filesystem;
mod store;

pub use constants::{STAGING_PREFIX, STAGING_SUFFIX, TOMBSTONE_PREFIX};
pub use filesystem::{EntryKind, FileSystem, LocalFs};
#[cfg(any(test, feature = "test-util"))]
pub use filesystem::{FsOp, MemoryFs};
pub use imgstore_types::{FileName, FolderName, NameError};
pub use store::{DeleteOutcome, FetchedEntry, FolderStore, StoredEntry, UpsertOutcome};

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Request was well-formed but unusable (e.g. empty payload)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Folder or file name failed path-safety validation
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] NameError),

    /// Entry or folder is absent where absence is an error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying filesystem failed
    #[error("Storage unavailable: {context}: {source}")]
    StorageUnavailable {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of [`FilesError`] used at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    StorageUnavailable,
}

impl FilesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::InvalidPath(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
        }
    }

    pub(crate) fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::StorageUnavailable {
            context: context.into(),
            source,
        }
    }
}

pub type FilesResult<T> = std::result::Result<T, FilesError>;
