//! Local disk implementation backed by `tokio::fs`.

use super::{EntryKind, FileSystem};
use async_trait::async_trait;
use std::fs::FileType;
use std::io;
use std::path::Path;
use tokio::fs;

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

fn kind_of(file_type: FileType) -> EntryKind {
    if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::Other
    }
}

#[async_trait]
impl FileSystem for LocalFs {
    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        fs::write(path, data).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path).await
    }

    async fn kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        match fs::symlink_metadata(path).await {
            Ok(metadata) => Ok(Some(kind_of(metadata.file_type()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_dir(&self, path: &Path) -> io::Result<Vec<(String, EntryKind)>> {
        let mut entries = fs::read_dir(path).await?;
        let mut children = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            // DirEntry::file_type does not follow symlinks.
            let file_type = entry.file_type().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            children.push((name, kind_of(file_type)));
        }

        Ok(children)
    }
}
