//! Virtual filesystem access
//!
//! A core keeps its content, configuration and output files in a private
//! filesystem it exposes to the host. [`CoreFileSystem`] is that primitive;
//! [`VirtualFileSystemBridge`] is the only code that talks to it.

mod bridge;
mod memfs;

pub use bridge::{PollConfig, VirtualFileSystemBridge};
pub use memfs::MemFs;

use thiserror::Error;

/// Failure reported by a core's filesystem primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("file exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("{path}: {message}")]
    Other { path: String, message: String },
}

/// The filesystem capability a core module exposes.
///
/// Mirrors what sandboxed cores actually offer: single-level `mkdir`, whole
/// file reads and writes that fail when the parent directory is missing, and
/// a synchronous size query.
pub trait CoreFileSystem: Send + Sync {
    fn mkdir(&self, path: &str) -> Result<(), FsError>;
    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), FsError>;
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError>;
    fn unlink(&self, path: &str) -> Result<(), FsError>;
    fn file_size(&self, path: &str) -> Result<u64, FsError>;
}

/// Create a directory and all of its missing parents.
pub fn mkdir_tree(fs: &dyn CoreFileSystem, path: &str) -> Result<(), FsError> {
    let mut current = String::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        current.push('/');
        current.push_str(component);
        match fs.mkdir(&current) {
            Ok(()) | Err(FsError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdir_tree_creates_missing_parents() {
        let fs = MemFs::new();
        mkdir_tree(&fs, "/a/b/c").unwrap();
        assert!(fs.is_dir("/a"));
        assert!(fs.is_dir("/a/b"));
        assert!(fs.is_dir("/a/b/c"));
    }

    #[test]
    fn mkdir_tree_is_idempotent() {
        let fs = MemFs::new();
        mkdir_tree(&fs, "/a/b").unwrap();
        mkdir_tree(&fs, "/a/b/").unwrap();
        assert!(fs.is_dir("/a/b"));
    }

    #[test]
    fn mkdir_tree_fails_through_a_file() {
        let fs = MemFs::new();
        fs.write_file("/a", b"file").unwrap();
        let err = mkdir_tree(&fs, "/a/b").unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_) | FsError::NotADirectory(_)));
    }
}
