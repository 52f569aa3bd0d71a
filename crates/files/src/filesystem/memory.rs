//! In-memory implementation for tests.
//!
//! Paths are stored verbatim in an ordered map. A path without a parent component (`/`, or the
//! empty path) is treated as an always-present directory.

use super::{EntryKind, FileSystem};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Operations that can be forced to fail with [`MemoryFs::fail_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOp {
    CreateDirAll,
    Write,
    Rename,
    Read,
    RemoveFile,
    RemoveDirAll,
    Kind,
    ListDir,
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<PathBuf, Node>,
    failing: HashSet<FsOp>,
}

/// A filesystem held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryFs {
    state: Mutex<State>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn is_implicit_dir(path: &Path) -> bool {
    path.parent().is_none()
}

impl State {
    fn check(&self, op: FsOp) -> io::Result<()> {
        if self.failing.contains(&op) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected failure for {op:?}"),
            ));
        }
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        is_implicit_dir(path) || matches!(self.nodes.get(path), Some(Node::Dir))
    }

    fn require_parent_dir(&self, path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !self.is_dir(parent) => Err(not_found(parent)),
            _ => Ok(()),
        }
    }

    fn descendants(&self, path: &Path) -> Vec<PathBuf> {
        self.nodes
            .keys()
            .filter(|key| key.starts_with(path))
            .cloned()
            .collect()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `op` fail with `PermissionDenied`.
    pub fn fail_on(&self, op: FsOp) {
        self.lock().failing.insert(op);
    }

    /// Undo all [`MemoryFs::fail_on`] calls.
    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Every path currently present, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().nodes.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::CreateDirAll)?;

        let mut ancestors: Vec<&Path> = path
            .ancestors()
            .filter(|ancestor| !is_implicit_dir(ancestor))
            .collect();
        ancestors.reverse();

        for ancestor in ancestors {
            match state.nodes.get(ancestor) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("file exists: {}", ancestor.display()),
                    ));
                }
                None => {
                    state.nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::Write)?;
        state.require_parent_dir(path)?;

        if state.is_dir(path) {
            return Err(io::Error::other(format!(
                "is a directory: {}",
                path.display()
            )));
        }
        state
            .nodes
            .insert(path.to_path_buf(), Node::File(data.to_vec()));
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::Rename)?;

        let node = state.nodes.get(from).cloned().ok_or_else(|| not_found(from))?;
        state.require_parent_dir(to)?;

        match node {
            Node::File(data) => {
                if state.is_dir(to) {
                    return Err(io::Error::other(format!(
                        "is a directory: {}",
                        to.display()
                    )));
                }
                state.nodes.remove(from);
                state.nodes.insert(to.to_path_buf(), Node::File(data));
            }
            Node::Dir => {
                if state.nodes.contains_key(to) {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("destination exists: {}", to.display()),
                    ));
                }
                if to.starts_with(from) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "cannot move a directory into itself",
                    ));
                }
                for old in state.descendants(from) {
                    let Some(node) = state.nodes.remove(&old) else {
                        continue;
                    };
                    let relative = old.strip_prefix(from).map_err(io::Error::other)?;
                    let new = if relative.as_os_str().is_empty() {
                        to.to_path_buf()
                    } else {
                        to.join(relative)
                    };
                    state.nodes.insert(new, node);
                }
            }
        }
        Ok(())
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let state = self.lock();
        state.check(FsOp::Read)?;

        match state.nodes.get(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(io::Error::other(format!(
                "is a directory: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::RemoveFile)?;

        match state.nodes.get(path) {
            Some(Node::File(_)) => {
                state.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::other(format!(
                "is a directory: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.check(FsOp::RemoveDirAll)?;

        match state.nodes.get(path) {
            Some(Node::Dir) => {
                for key in state.descendants(path) {
                    state.nodes.remove(&key);
                }
                Ok(())
            }
            Some(Node::File(_)) => Err(io::Error::other(format!(
                "not a directory: {}",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    async fn kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        let state = self.lock();
        state.check(FsOp::Kind)?;

        if is_implicit_dir(path) {
            return Ok(Some(EntryKind::Dir));
        }
        Ok(state.nodes.get(path).map(|node| match node {
            Node::Dir => EntryKind::Dir,
            Node::File(_) => EntryKind::File,
        }))
    }

    async fn list_dir(&self, path: &Path) -> io::Result<Vec<(String, EntryKind)>> {
        let state = self.lock();
        state.check(FsOp::ListDir)?;

        if !state.is_dir(path) {
            return Err(not_found(path));
        }

        Ok(state
            .nodes
            .iter()
            .filter(|(key, _)| key.parent() == Some(path))
            .filter_map(|(key, node)| {
                let name = key.file_name()?.to_string_lossy().into_owned();
                let kind = match node {
                    Node::Dir => EntryKind::Dir,
                    Node::File(_) => EntryKind::File,
                };
                Some((name, kind))
            })
            .collect())
    }
}
