//! Folder-scoped file store implementation
//!
//! [`FolderStore`] maps `(folder, filename)` pairs onto regular files under a single root
//! directory and implements the six store operations on top of [`FileSystem`].
//!
//! # Write Path
//!
//! Every write goes through [`FolderStore::ensure_folder`] and then stages the payload in a
//! dot-prefixed file inside the target folder before renaming it into place. Readers see either
//! the previous content or the new content, never a partial write.
//!
//! # Delete-All
//!
//! A folder is purged in two steps: it is first renamed to a tombstone directly under the root,
//! which makes it vanish atomically for every other operation, and the tombstone is then removed
//! recursively. A concurrent write that arrives after the rename recreates a fresh, empty folder
//! rather than landing in a half-deleted one.
//!
//! # Concurrency
//!
//! The store holds no locks and no cache. Operations on different paths are independent;
//! operations on the same path rely on the atomicity the filesystem offers for rename and unlink.

use crate::constants::{STAGING_PREFIX, STAGING_SUFFIX, TOMBSTONE_PREFIX};
use crate::filesystem::{EntryKind, FileSystem};
use crate::{FilesError, FilesResult};
use imgstore_types::{FileName, FolderName};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// How many times a detached folder's removal is attempted before delete-all reports failure.
const TOMBSTONE_REMOVE_ATTEMPTS: u32 = 3;

/// Result of a successful [`FolderStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub folder: FolderName,
    pub filename: FileName,
    /// Number of bytes written
    pub size: u64,
}

/// Which branch [`FolderStore::upsert`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The entry was absent and has been written
    Created,
    /// The entry already existed and was left untouched
    Updated,
}

/// Which branch [`FolderStore::delete`] took. Both are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Content returned by [`FolderStore::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedEntry {
    pub data: Vec<u8>,
    pub size: u64,
    /// Media type sniffed from the content. Best effort, not authoritative.
    pub media_type: Option<&'static str>,
}

/// Stateless store over a root directory.
///
/// Cloning is cheap and every clone operates on the same tree.
#[derive(Debug, Clone)]
pub struct FolderStore {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl FolderStore {
    /// Opens a store rooted at `root`, creating the directory if absent.
    ///
    /// Tombstones left behind by an interrupted delete-all and staging files left behind by an
    /// interrupted write are removed on a best-effort basis; failure to remove one is logged and
    /// does not prevent the store from opening.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::StorageUnavailable`] if the root cannot be created, or
    /// [`FilesError::InvalidInput`] if `root` exists but is not a directory.
    pub async fn open(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> FilesResult<Self> {
        let root = root.into();

        match fs.kind(&root).await.map_err(|e| {
            FilesError::storage(format!("failed to inspect root {}", root.display()), e)
        })? {
            Some(EntryKind::Dir) => {}
            None => {
                fs.create_dir_all(&root).await.map_err(|e| {
                    FilesError::storage(format!("failed to create root {}", root.display()), e)
                })?;
                tracing::info!(root = %root.display(), "created storage root");
            }
            Some(_) => {
                return Err(FilesError::InvalidInput(format!(
                    "storage root is not a directory: {}",
                    root.display()
                )));
            }
        }

        let store = Self { fs, root };
        store.sweep_leftovers().await;
        Ok(store)
    }

    /// Returns the storage root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `data` to `(folder, filename)`, creating the folder if needed and overwriting any
    /// existing entry.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidInput`] if `data` is empty or the entry path holds something other
    ///   than a regular file
    /// - [`FilesError::StorageUnavailable`] on any I/O failure
    pub async fn create(
        &self,
        folder: &FolderName,
        filename: &FileName,
        data: &[u8],
    ) -> FilesResult<StoredEntry> {
        if data.is_empty() {
            return Err(FilesError::InvalidInput("no file content provided".into()));
        }

        let file_path = self.entry_path(folder, filename);
        if let Some(EntryKind::Dir | EntryKind::Other) =
            self.kind(&file_path, folder, filename).await?
        {
            return Err(not_a_file(folder, filename));
        }

        let folder_path = self.ensure_folder(folder).await?;
        self.write_entry(&folder_path, folder, filename, data).await?;

        tracing::debug!(
            folder = %folder,
            filename = %filename,
            size = data.len(),
            "entry stored"
        );

        Ok(StoredEntry {
            folder: folder.clone(),
            filename: filename.clone(),
            size: data.len() as u64,
        })
    }

    /// Creates `(folder, filename)` from `data` if it does not exist; if it does, reports
    /// [`UpsertOutcome::Updated`] and leaves the stored bytes unchanged.
    ///
    /// `data` is only consulted on the create branch, so an existing entry is reported as updated
    /// whether or not a payload was supplied.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidInput`] if the entry is absent and `data` is missing or empty, or
    ///   the entry path holds something other than a regular file
    /// - [`FilesError::StorageUnavailable`] on any I/O failure
    pub async fn upsert(
        &self,
        folder: &FolderName,
        filename: &FileName,
        data: Option<&[u8]>,
    ) -> FilesResult<UpsertOutcome> {
        let file_path = self.entry_path(folder, filename);
        match self.kind(&file_path, folder, filename).await? {
            Some(EntryKind::File) => {
                tracing::debug!(folder = %folder, filename = %filename, "entry exists, left as is");
                return Ok(UpsertOutcome::Updated);
            }
            Some(_) => return Err(not_a_file(folder, filename)),
            None => {}
        }

        let data = match data {
            Some(data) if !data.is_empty() => data,
            _ => return Err(FilesError::InvalidInput("no file content provided".into())),
        };

        let folder_path = self.ensure_folder(folder).await?;
        self.write_entry(&folder_path, folder, filename, data).await?;

        tracing::debug!(
            folder = %folder,
            filename = %filename,
            size = data.len(),
            "entry created"
        );
        Ok(UpsertOutcome::Created)
    }

    /// Removes `(folder, filename)`. Removing an absent entry is a success.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidInput`] if the entry path holds something other than a regular file
    /// - [`FilesError::StorageUnavailable`] on any I/O failure
    pub async fn delete(
        &self,
        folder: &FolderName,
        filename: &FileName,
    ) -> FilesResult<DeleteOutcome> {
        let file_path = self.entry_path(folder, filename);

        match self.kind(&file_path, folder, filename).await? {
            None => return Ok(DeleteOutcome::AlreadyAbsent),
            Some(EntryKind::File) => {}
            Some(_) => return Err(not_a_file(folder, filename)),
        }

        match self.fs.remove_file(&file_path).await {
            Ok(()) => {
                tracing::debug!(folder = %folder, filename = %filename, "entry deleted");
                Ok(DeleteOutcome::Deleted)
            }
            // Lost a race with another delete; the goal is still met.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(FilesError::storage(
                format!("failed to delete {folder}/{filename}"),
                e,
            )),
        }
    }

    /// Removes `folder` and everything beneath it. Returns the number of regular files removed.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if the folder does not exist
    /// - [`FilesError::StorageUnavailable`] if the folder could not be detached or any part of it
    ///   could not be removed
    pub async fn delete_all(&self, folder: &FolderName) -> FilesResult<u64> {
        let folder_path = self.folder_path(folder);

        let kind = self.fs.kind(&folder_path).await.map_err(|e| {
            FilesError::storage(format!("failed to inspect folder {folder}"), e)
        })?;
        if kind != Some(EntryKind::Dir) {
            return Err(FilesError::NotFound(format!("folder {folder}")));
        }

        let tombstone = self.root.join(format!(
            "{TOMBSTONE_PREFIX}{}",
            Uuid::new_v4().simple()
        ));
        match self.fs.rename(&folder_path, &tombstone).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FilesError::NotFound(format!("folder {folder}")));
            }
            Err(e) => {
                return Err(FilesError::storage(
                    format!("failed to detach folder {folder}"),
                    e,
                ));
            }
        }

        let removed = match self.fs.list_dir(&tombstone).await {
            Ok(children) => children
                .iter()
                .filter(|(name, kind)| *kind == EntryKind::File && !name.starts_with('.'))
                .count() as u64,
            Err(e) => {
                tracing::warn!(
                    folder = %folder,
                    error = %e,
                    "could not count files before removal"
                );
                0
            }
        };

        self.remove_tombstone(&tombstone).await.map_err(|e| {
            FilesError::storage(
                format!("folder {folder} was detached but could not be fully removed"),
                e,
            )
        })?;

        tracing::debug!(folder = %folder, removed, "folder deleted");
        Ok(removed)
    }

    /// Reads `(folder, filename)`.
    ///
    /// # Errors
    ///
    /// - [`FilesError::NotFound`] if the entry or its folder does not exist
    /// - [`FilesError::StorageUnavailable`] on any I/O failure
    pub async fn fetch(
        &self,
        folder: &FolderName,
        filename: &FileName,
    ) -> FilesResult<FetchedEntry> {
        let file_path = self.entry_path(folder, filename);

        if self.kind(&file_path, folder, filename).await? != Some(EntryKind::File) {
            return Err(FilesError::NotFound(format!("{folder}/{filename}")));
        }

        // The entry may vanish between the kind check and the read.
        let data = self.fs.read(&file_path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FilesError::NotFound(format!("{folder}/{filename}"))
            } else {
                FilesError::storage(format!("failed to read {folder}/{filename}"), e)
            }
        })?;

        let media_type = infer::get(&data).map(|kind| kind.mime_type());

        Ok(FetchedEntry {
            size: data.len() as u64,
            data,
            media_type,
        })
    }

    /// Counts the regular files directly inside `folder`. An absent folder counts as 0.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::StorageUnavailable`] if the folder exists but cannot be listed.
    pub async fn count(&self, folder: &FolderName) -> FilesResult<u64> {
        let folder_path = self.folder_path(folder);

        let kind = self.fs.kind(&folder_path).await.map_err(|e| {
            FilesError::storage(format!("failed to inspect folder {folder}"), e)
        })?;
        if kind != Some(EntryKind::Dir) {
            return Ok(0);
        }

        let children = match self.fs.list_dir(&folder_path).await {
            Ok(children) => children,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(FilesError::storage(
                    format!("failed to list folder {folder}"),
                    e,
                ));
            }
        };

        Ok(children
            .iter()
            .filter(|(name, kind)| *kind == EntryKind::File && !name.starts_with('.'))
            .count() as u64)
    }

    /// Creates the folder directory if it is absent and returns its path.
    ///
    /// Every write path goes through here.
    async fn ensure_folder(&self, folder: &FolderName) -> FilesResult<PathBuf> {
        let folder_path = self.folder_path(folder);
        self.fs.create_dir_all(&folder_path).await.map_err(|e| {
            FilesError::storage(format!("failed to create folder {folder}"), e)
        })?;
        Ok(folder_path)
    }

    /// Stages `data` next to the target and renames it into place.
    async fn write_entry(
        &self,
        folder_path: &Path,
        folder: &FolderName,
        filename: &FileName,
        data: &[u8],
    ) -> FilesResult<()> {
        let staging = folder_path.join(format!(
            "{STAGING_PREFIX}{}{STAGING_SUFFIX}",
            Uuid::new_v4().simple()
        ));
        let target = folder_path.join(filename);

        self.fs.write(&staging, data).await.map_err(|e| {
            FilesError::storage(format!("failed to stage {folder}/{filename}"), e)
        })?;

        if let Err(e) = self.fs.rename(&staging, &target).await {
            if let Err(cleanup) = self.fs.remove_file(&staging).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "failed to remove staging file"
                    );
                }
            }
            return Err(FilesError::storage(
                format!("failed to write {folder}/{filename}"),
                e,
            ));
        }

        Ok(())
    }

    async fn kind(
        &self,
        path: &Path,
        folder: &FolderName,
        filename: &FileName,
    ) -> FilesResult<Option<EntryKind>> {
        self.fs
            .kind(path)
            .await
            .map_err(|e| FilesError::storage(format!("failed to inspect {folder}/{filename}"), e))
    }

    /// Removes a detached folder.
    ///
    /// A write that created its staging file before the detach can land in the tombstone while it
    /// is being removed, so the removal is retried a few times before giving up.
    async fn remove_tombstone(&self, tombstone: &Path) -> io::Result<()> {
        let mut attempt = 1;
        loop {
            match self.fs.remove_dir_all(tombstone).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) if attempt < TOMBSTONE_REMOVE_ATTEMPTS => {
                    tracing::debug!(
                        path = %tombstone.display(),
                        attempt,
                        error = %e,
                        "retrying tombstone removal"
                    );
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Removes `.trash-*` directories directly under the root and `.upload-*.tmp` files inside
    /// each folder.
    async fn sweep_leftovers(&self) {
        let children = match self.fs.list_dir(&self.root).await {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!(error = %e, "could not scan storage root for leftovers");
                return;
            }
        };

        for (name, kind) in children {
            if kind != EntryKind::Dir {
                continue;
            }
            let path = self.root.join(&name);
            if name.starts_with(TOMBSTONE_PREFIX) {
                match self.fs.remove_dir_all(&path).await {
                    Ok(()) => tracing::info!(tombstone = %name, "removed stale tombstone"),
                    Err(e) => {
                        tracing::warn!(
                            tombstone = %name,
                            error = %e,
                            "failed to remove stale tombstone"
                        );
                    }
                }
            } else if !name.starts_with('.') {
                self.sweep_staging_files(&path).await;
            }
        }
    }

    async fn sweep_staging_files(&self, folder_path: &Path) {
        let children = match self.fs.list_dir(folder_path).await {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!(
                    folder = %folder_path.display(),
                    error = %e,
                    "could not scan folder for staging files"
                );
                return;
            }
        };

        for (name, kind) in children {
            if kind != EntryKind::File || !is_staging_name(&name) {
                continue;
            }
            let path = folder_path.join(&name);
            match self.fs.remove_file(&path).await {
                Ok(()) => tracing::info!(path = %path.display(), "removed stale staging file"),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to remove stale staging file"
                    );
                }
            }
        }
    }

    fn folder_path(&self, folder: &FolderName) -> PathBuf {
        self.root.join(folder)
    }

    fn entry_path(&self, folder: &FolderName, filename: &FileName) -> PathBuf {
        self.folder_path(folder).join(filename)
    }
}

fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)
}

fn not_a_file(folder: &FolderName, filename: &FileName) -> FilesError {
    FilesError::InvalidInput(format!("{folder}/{filename} is not a regular file"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::{FsOp, LocalFs, MemoryFs};
    use crate::ErrorKind;
    use tempfile::TempDir;

    fn folder(name: &str) -> FolderName {
        FolderName::parse(name).unwrap()
    }

    fn file(name: &str) -> FileName {
        FileName::parse(name).unwrap()
    }

    async fn memory_store() -> (Arc<MemoryFs>, FolderStore) {
        let fs = Arc::new(MemoryFs::new());
        let store = FolderStore::open(fs.clone(), "/images").await.unwrap();
        (fs, store)
    }

    /// Snapshot of every path under `root` relative to it, sorted
    fn tree(root: &Path) -> Vec<PathBuf> {
        fn walk(dir: &Path, root: &Path, out: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
                if path.is_dir() {
                    walk(&path, root, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(root, root, &mut out);
        out.sort();
        out
    }

    #[tokio::test]
    async fn test_open_creates_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("images");

        let store = FolderStore::open(Arc::new(LocalFs), &root).await.unwrap();

        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_open_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("images");
        std::fs::write(&root, b"not a directory").unwrap();

        let result = FolderStore::open(Arc::new(LocalFs), &root).await;

        assert!(matches!(result, Err(FilesError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_open_sweeps_stale_tombstones() {
        let temp = TempDir::new().unwrap();
        let stale = temp.path().join(".trash-0123");
        std::fs::create_dir_all(stale.join("nested")).unwrap();
        std::fs::write(stale.join("nested/a.png"), b"a").unwrap();
        std::fs::create_dir(temp.path().join("keep")).unwrap();

        FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();

        assert!(!stale.exists());
        assert!(temp.path().join("keep").is_dir());
    }

    #[tokio::test]
    async fn test_open_sweeps_stale_staging_files() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("f")).unwrap();
        std::fs::write(temp.path().join("f/a.png"), b"a").unwrap();
        std::fs::write(temp.path().join("f/.upload-dead.tmp"), b"partial").unwrap();

        FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();

        assert_eq!(
            tree(temp.path()),
            vec![PathBuf::from("f"), PathBuf::from("f/a.png")]
        );
    }

    #[tokio::test]
    async fn test_create_then_fetch_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();
        let data: Vec<u8> = (0..=255).collect();

        let stored = store.create(&folder("cats"), &file("tom.bin"), &data).await.unwrap();
        let fetched = store.fetch(&folder("cats"), &file("tom.bin")).await.unwrap();

        assert_eq!(stored.size, 256);
        assert_eq!(stored.folder.as_str(), "cats");
        assert_eq!(stored.filename.as_str(), "tom.bin");
        assert_eq!(fetched.data, data);
        assert_eq!(fetched.size, 256);
    }

    #[tokio::test]
    async fn test_create_overwrites_existing_entry() {
        let (_, store) = memory_store().await;

        store.create(&folder("f"), &file("a"), b"first").await.unwrap();
        store.create(&folder("f"), &file("a"), b"second").await.unwrap();

        let fetched = store.fetch(&folder("f"), &file("a")).await.unwrap();
        assert_eq!(fetched.data, b"second");
        assert_eq!(store.count(&folder("f")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_payload_without_touching_disk() {
        let (fs, store) = memory_store().await;
        let before = fs.paths();

        let result = store.create(&folder("f"), &file("a"), b"").await;

        assert!(matches!(result, Err(FilesError::InvalidInput(_))));
        assert_eq!(fs.paths(), before);
    }

    #[tokio::test]
    async fn test_create_leaves_no_staging_files() {
        let temp = TempDir::new().unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();

        store.create(&folder("f"), &file("a.png"), b"x").await.unwrap();

        assert_eq!(
            tree(temp.path()),
            vec![PathBuf::from("f"), PathBuf::from("f/a.png")]
        );
    }

    #[tokio::test]
    async fn test_failed_rename_cleans_up_staging_file() {
        let (fs, store) = memory_store().await;
        fs.fail_on(FsOp::Rename);

        let err = store
            .create(&folder("f"), &file("a"), b"x")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(
            fs.paths(),
            vec![PathBuf::from("/images"), PathBuf::from("/images/f")]
        );
    }

    #[tokio::test]
    async fn test_same_filename_in_different_folders() {
        let (_, store) = memory_store().await;

        store.create(&folder("a"), &file("x"), b"in a").await.unwrap();
        store.create(&folder("b"), &file("x"), b"in b").await.unwrap();

        assert_eq!(store.fetch(&folder("a"), &file("x")).await.unwrap().data, b"in a");
        assert_eq!(store.fetch(&folder("b"), &file("x")).await.unwrap().data, b"in b");
    }

    #[tokio::test]
    async fn test_count_two_files() {
        let (_, store) = memory_store().await;
        assert_eq!(store.count(&folder("f")).await.unwrap(), 0);

        store.create(&folder("f"), &file("one"), b"1").await.unwrap();
        store.create(&folder("f"), &file("two"), b"2").await.unwrap();

        assert_eq!(store.count(&folder("f")).await.unwrap(), 2);
        assert_eq!(store.count(&folder("never")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_ignores_subdirectories_and_staging_files() {
        let temp = TempDir::new().unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();
        store.create(&folder("f"), &file("a.png"), b"a").await.unwrap();
        std::fs::create_dir(temp.path().join("f/stray")).unwrap();
        std::fs::write(temp.path().join("f/.upload-inflight.tmp"), b"partial").unwrap();

        assert_eq!(store.count(&folder("f")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_surfaces_listing_failure() {
        let (fs, store) = memory_store().await;
        store.create(&folder("f"), &file("a"), b"a").await.unwrap();
        fs.fail_on(FsOp::ListDir);

        let err = store.count(&folder("f")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[tokio::test]
    async fn test_delete_missing_entry_is_success() {
        let (_, store) = memory_store().await;

        let outcome = store.delete(&folder("f"), &file("ghost")).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);

        let fetched = store.fetch(&folder("f"), &file("ghost")).await;
        assert!(matches!(fetched, Err(FilesError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_keeps_siblings_and_folder() {
        let (fs, store) = memory_store().await;
        store.create(&folder("f"), &file("a"), b"a").await.unwrap();
        store.create(&folder("f"), &file("b"), b"b").await.unwrap();

        let outcome = store.delete(&folder("f"), &file("a")).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(store.count(&folder("f")).await.unwrap(), 1);
        assert!(fs.paths().contains(&PathBuf::from("/images/f")));
        assert!(fs.paths().contains(&PathBuf::from("/images/f/b")));
    }

    #[tokio::test]
    async fn test_delete_surfaces_io_error() {
        let (fs, store) = memory_store().await;
        store.create(&folder("f"), &file("a"), b"a").await.unwrap();
        fs.fail_on(FsOp::RemoveFile);

        let err = store.delete(&folder("f"), &file("a")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[tokio::test]
    async fn test_upsert_creates_then_keeps_original_bytes() {
        let (_, store) = memory_store().await;

        let first = store
            .upsert(&folder("f"), &file("a"), Some(b"original".as_slice()))
            .await
            .unwrap();
        assert_eq!(first, UpsertOutcome::Created);
        assert_eq!(store.fetch(&folder("f"), &file("a")).await.unwrap().data, b"original");

        let second = store
            .upsert(&folder("f"), &file("a"), Some(b"replacement".as_slice()))
            .await
            .unwrap();
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.fetch(&folder("f"), &file("a")).await.unwrap().data, b"original");
    }

    #[tokio::test]
    async fn test_upsert_existing_entry_ignores_missing_or_empty_payload() {
        let (_, store) = memory_store().await;
        store.create(&folder("f"), &file("a"), b"orig").await.unwrap();

        let empty = store
            .upsert(&folder("f"), &file("a"), Some(b"".as_slice()))
            .await
            .unwrap();
        let missing = store.upsert(&folder("f"), &file("a"), None).await.unwrap();

        assert_eq!(empty, UpsertOutcome::Updated);
        assert_eq!(missing, UpsertOutcome::Updated);
        assert_eq!(store.fetch(&folder("f"), &file("a")).await.unwrap().data, b"orig");
    }

    #[tokio::test]
    async fn test_upsert_absent_entry_requires_payload() {
        let (fs, store) = memory_store().await;
        let before = fs.paths();

        let empty = store
            .upsert(&folder("f"), &file("a"), Some(b"".as_slice()))
            .await;
        let missing = store.upsert(&folder("f"), &file("a"), None).await;

        assert!(matches!(empty, Err(FilesError::InvalidInput(_))));
        assert!(matches!(missing, Err(FilesError::InvalidInput(_))));
        assert_eq!(fs.paths(), before);
    }

    #[tokio::test]
    async fn test_upsert_creates_missing_folder() {
        let (_, store) = memory_store().await;

        store
            .upsert(&folder("new"), &file("a"), Some(b"x".as_slice()))
            .await
            .unwrap();

        assert_eq!(store.count(&folder("new")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_directory_at_entry_path() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("f/a")).unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();

        let result = store
            .upsert(&folder("f"), &file("a"), Some(b"x".as_slice()))
            .await;
        assert!(matches!(result, Err(FilesError::InvalidInput(_))));

        let fetched = store.fetch(&folder("f"), &file("a")).await;
        assert!(matches!(fetched, Err(FilesError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_directory_at_entry_path() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("f/a")).unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();

        let result = store.create(&folder("f"), &file("a"), b"x").await;

        assert!(matches!(result, Err(FilesError::InvalidInput(_))));
        assert!(temp.path().join("f/a").is_dir());
        assert_eq!(
            tree(temp.path()),
            vec![PathBuf::from("f"), PathBuf::from("f/a")]
        );
    }

    #[tokio::test]
    async fn test_upsert_surfaces_write_failure() {
        let (fs, store) = memory_store().await;
        fs.fail_on(FsOp::Write);

        let err = store
            .upsert(&folder("f"), &file("a"), Some(b"x".as_slice()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[tokio::test]
    async fn test_delete_all_removes_folder() {
        let temp = TempDir::new().unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();
        store.create(&folder("f"), &file("a"), b"a").await.unwrap();
        store.create(&folder("f"), &file("b"), b"b").await.unwrap();
        store.create(&folder("other"), &file("c"), b"c").await.unwrap();

        let removed = store.delete_all(&folder("f")).await.unwrap();

        assert_eq!(removed, 2);
        assert!(!temp.path().join("f").exists());
        assert_eq!(store.count(&folder("f")).await.unwrap(), 0);
        assert!(matches!(
            store.fetch(&folder("f"), &file("a")).await,
            Err(FilesError::NotFound(_))
        ));
        assert_eq!(
            tree(temp.path()),
            vec![PathBuf::from("other"), PathBuf::from("other/c")]
        );
    }

    #[tokio::test]
    async fn test_delete_all_missing_folder_is_not_found() {
        let (_, store) = memory_store().await;

        let result = store.delete_all(&folder("never")).await;
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_all_partial_failure_is_reported() {
        let (fs, store) = memory_store().await;
        store.create(&folder("f"), &file("a"), b"a").await.unwrap();
        fs.fail_on(FsOp::RemoveDirAll);

        let err = store.delete_all(&folder("f")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);

        // Detached before the failure, so the folder is already gone from view.
        assert_eq!(store.count(&folder("f")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_after_delete_all_starts_fresh() {
        let (_, store) = memory_store().await;
        store.create(&folder("f"), &file("old"), b"old").await.unwrap();
        store.delete_all(&folder("f")).await.unwrap();

        store.create(&folder("f"), &file("new"), b"new").await.unwrap();

        assert_eq!(store.count(&folder("f")).await.unwrap(), 1);
        assert!(store.fetch(&folder("f"), &file("old")).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_missing_folder_is_not_found() {
        let (_, store) = memory_store().await;

        let result = store.fetch(&folder("nowhere"), &file("a")).await;
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_sniffs_media_type() {
        let (_, store) = memory_store().await;
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        store.create(&folder("f"), &file("pic"), &png).await.unwrap();
        store.create(&folder("f"), &file("txt"), b"hello").await.unwrap();

        let pic = store.fetch(&folder("f"), &file("pic")).await.unwrap();
        let txt = store.fetch(&folder("f"), &file("txt")).await.unwrap();

        assert_eq!(pic.media_type, Some("image/png"));
        assert_eq!(txt.media_type, None);
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_touching_disk() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("images");
        let store = FolderStore::open(Arc::new(LocalFs), &root).await.unwrap();
        store.create(&folder("f"), &file("a"), b"a").await.unwrap();
        let before = tree(temp.path());

        for bad in ["..", "../images", "/etc", "f/../../x", ".trash-1"] {
            let folder_err = FolderName::parse(bad).map(|_| ()).unwrap_err();
            let file_err = FileName::parse(bad).map(|_| ()).unwrap_err();
            assert_eq!(FilesError::from(folder_err).kind(), ErrorKind::InvalidInput);
            assert_eq!(FilesError::from(file_err).kind(), ErrorKind::InvalidInput);
        }

        assert_eq!(tree(temp.path()), before);
    }

    #[tokio::test]
    async fn test_concurrent_creates_in_one_folder() {
        let temp = TempDir::new().unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let name = FileName::parse(format!("img-{i}")).unwrap();
                store
                    .create(&FolderName::parse("shared").unwrap(), &name, b"data")
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count(&folder("shared")).await.unwrap(), 16);
    }

    #[tokio::test]
    async fn test_concurrent_overwrites_never_tear() {
        let temp = TempDir::new().unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();
        let a = vec![b'a'; 64 * 1024];
        let b = vec![b'b'; 64 * 1024];
        store.create(&folder("f"), &file("x"), &a).await.unwrap();

        let writer = {
            let store = store.clone();
            let (a, b) = (a.clone(), b.clone());
            tokio::spawn(async move {
                for i in 0..20 {
                    let data = if i % 2 == 0 { &b } else { &a };
                    let (f, x) = (FolderName::parse("f").unwrap(), FileName::parse("x").unwrap());
                    store.create(&f, &x, data).await.unwrap();
                }
            })
        };

        for _ in 0..20 {
            let fetched = store.fetch(&folder("f"), &file("x")).await.unwrap();
            assert!(fetched.data == a || fetched.data == b, "torn read observed");
        }
        writer.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delete_all_racing_creates_leaves_no_half_deleted_folder() {
        let temp = TempDir::new().unwrap();
        let store = FolderStore::open(Arc::new(LocalFs), temp.path())
            .await
            .unwrap();
        let payload = vec![b'p'; 16 * 1024];

        for round in 0..50 {
            let target = folder(&format!("race-{round}"));
            store.create(&target, &file("seed"), &payload).await.unwrap();

            let mut writers = Vec::new();
            for i in 0..4 {
                let store = store.clone();
                let target = target.clone();
                let payload = payload.clone();
                writers.push(tokio::spawn(async move {
                    let name = FileName::parse(format!("img-{i}")).unwrap();
                    store.create(&target, &name, &payload).await
                }));
            }
            let deleter = {
                let store = store.clone();
                let target = target.clone();
                tokio::spawn(async move { store.delete_all(&target).await })
            };

            for writer in writers {
                if let Err(e) = writer.await.unwrap() {
                    assert_eq!(e.kind(), ErrorKind::StorageUnavailable);
                }
            }
            deleter.await.unwrap().unwrap();

            let folder_path = temp.path().join(target.as_str());
            if folder_path.exists() {
                for entry in std::fs::read_dir(&folder_path).unwrap() {
                    let path = entry.unwrap().path();
                    assert_eq!(std::fs::read(&path).unwrap(), payload, "{path:?} is incomplete");
                }
            }
        }

        for path in tree(temp.path()) {
            let leftover = path.components().any(|c| {
                let name = c.as_os_str().to_string_lossy();
                name.starts_with(TOMBSTONE_PREFIX) || name.starts_with(STAGING_PREFIX)
            });
            assert!(!leftover, "leftover {path:?}");
        }
    }
}
