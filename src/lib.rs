//! Submit CRYSTAL jobs to local or batch backends and keep track of what was submitted
//!
//! A [`record::JobRecord`] remembers every backend id a task has ever produced. A
//! [`submitter::Submitter`] drives one [`submitter::Backend`] and appends to the record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

/// Append-only task name to backend id log
pub mod record;
/// Backend-agnostic submission contract and its concrete backends
pub mod submitter;
/// JobRecord persistence in a SQLite database
pub mod db;

/// Directory where jobs run and where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    pub path: PathBuf,
}

impl WorkingDirectory {
    pub fn new(path: impl Into<PathBuf>) -> WorkingDirectory {
        WorkingDirectory { path: path.into() }
    }

    /// The process current directory, only used when nothing explicit was configured
    pub fn current() -> io::Result<WorkingDirectory> {
        Ok(WorkingDirectory { path: std::env::current_dir()? })
    }

    /// Create the directory if it's missing. Succeeds if it already exists.
    pub fn ensure(&self) -> io::Result<()> {
        if !self.path.is_dir() {
            info!("Creating working directory {}", self.path.display());
        }
        fs::create_dir_all(&self.path)
    }

    /// The same directory as an absolute path, relative paths are taken from the current directory
    pub fn absolute(&self) -> io::Result<WorkingDirectory> {
        if self.path.is_absolute() {
            return Ok(self.clone());
        }
        Ok(WorkingDirectory { path: std::env::current_dir()?.join(&self.path) })
    }

    pub fn join(&self, path: impl AsRef<Path>) -> WorkingDirectory {
        WorkingDirectory { path: self.path.join(path) }
    }

    /// Resolve a possibly relative path against this directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.path.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let wd = WorkingDirectory::new(tmp.path()).join("si");
        wd.ensure().unwrap();
        wd.ensure().unwrap();
        assert!(wd.path.is_dir());
    }

    #[test]
    fn absolute_leaves_absolute_paths_alone() {
        let wd = WorkingDirectory::new("/scratch/si");
        assert_eq!(wd.absolute().unwrap(), wd);

        let relative = WorkingDirectory::new("runs/si").absolute().unwrap();
        assert!(relative.path.is_absolute());
        assert!(relative.path.ends_with("runs/si"));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let wd = WorkingDirectory::new("/scratch/si");
        assert_eq!(wd.resolve(Path::new("/tmp/a.in")), PathBuf::from("/tmp/a.in"));
        assert_eq!(wd.resolve(Path::new("a.in")), PathBuf::from("/scratch/si/a.in"));
    }
}
