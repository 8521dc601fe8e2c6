//! Filesystem queries used for classification and traversal

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Filesystem capability consumed by the session
pub trait FsQuery {
    /// Whether `path` currently exists and is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Immediate children of the directory `path`
    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Every directory below `root` (excluding `root`), parents before children
    ///
    /// Directories for which `skip` returns true are left out together with
    /// their subtrees.
    fn walk_dirs(&self, root: &Path, skip: &dyn Fn(&Path) -> bool) -> io::Result<Vec<PathBuf>>;
}

/// Host filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FsQuery for LocalFs {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect()
    }

    fn walk_dirs(&self, root: &Path, skip: &dyn Fn(&Path) -> bool) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && skip(e.path())))
        {
            let entry = entry?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }

        Ok(dirs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    File,
    Dir,
}

/// In-memory filesystem tree
///
/// Clones share the same tree, so a test can keep one handle and mutate the
/// tree while a session holds another.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    nodes: Arc<Mutex<BTreeMap<PathBuf, Node>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory and any missing parents
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut nodes = self.nodes.lock();
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() || ancestor.parent().is_none() {
                continue;
            }
            nodes.insert(ancestor.to_path_buf(), Node::Dir);
        }
    }

    /// Create a file, creating missing parent directories
    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes.lock().insert(path.to_path_buf(), Node::File);
    }

    /// Remove an entry and everything below it
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes.lock().retain(|p, _| !p.starts_with(path));
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.nodes.lock().contains_key(path.as_ref())
    }
}

impl FsQuery for MemoryFs {
    fn is_dir(&self, path: &Path) -> bool {
        self.nodes.lock().get(path) == Some(&Node::Dir)
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let nodes = self.nodes.lock();
        match nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("not a directory: {}", path.display()),
                ))
            }
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such directory: {}", path.display()),
                ))
            }
        }

        Ok(nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }

    fn walk_dirs(&self, root: &Path, skip: &dyn Fn(&Path) -> bool) -> io::Result<Vec<PathBuf>> {
        if !self.is_dir(root) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such directory: {}", root.display()),
            ));
        }

        let mut dirs = Vec::new();
        let mut stack = self.child_dirs(root, skip)?;
        while let Some(dir) = stack.pop() {
            stack.extend(self.child_dirs(&dir, skip)?);
            dirs.push(dir);
        }

        Ok(dirs)
    }
}

impl MemoryFs {
    /// Unskipped child directories, reversed so a stack pops them in order
    fn child_dirs(&self, dir: &Path, skip: &dyn Fn(&Path) -> bool) -> io::Result<Vec<PathBuf>> {
        let mut children: Vec<PathBuf> = self
            .list_children(dir)?
            .into_iter()
            .filter(|child| self.is_dir(child) && !skip(child))
            .collect();
        children.reverse();
        Ok(children)
    }
}
