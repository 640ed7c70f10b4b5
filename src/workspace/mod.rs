//! Filesystem and build-tool collaborators of a run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub trait Workspace {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_writable(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Copies `from` to `to`, creating missing parent directories.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsWorkspace;

impl Workspace for OsWorkspace {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    /// Tries to create a file in `path`; permission bits alone miss ownership.
    fn is_writable(&self, path: &Path) -> bool {
        tempfile::Builder::new()
            .prefix(".idlgen-")
            .tempfile_in(path)
            .is_ok()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        // a fresh copy gets the current time, never older than `from`
        fs::copy(from, to).map(|_| ())
    }
}

/// Receives directories holding generated sources for later build steps.
pub trait SourceRootRegistry {
    fn register(&mut self, root: &Path);
}

/// Announces generated source roots on stdout, one per line.
#[derive(Debug, Default)]
pub struct AnnouncingRegistry {
    roots: Vec<PathBuf>,
}

impl AnnouncingRegistry {
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl SourceRootRegistry for AnnouncingRegistry {
    fn register(&mut self, root: &Path) {
        if self.roots.iter().any(|known| known == root) {
            return;
        }
        println!("generated-sources: {}", root.display());
        self.roots.push(root.to_path_buf());
    }
}
