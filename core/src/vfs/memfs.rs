//! In-memory filesystem backing native cores

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{CoreFileSystem, FsError};

enum Node {
    Dir,
    File(Vec<u8>),
}

/// A core's private filesystem, held entirely in host memory.
///
/// Paths are absolute and `/`-separated; a trailing slash is ignored.
pub struct MemFs {
    nodes: Mutex<BTreeMap<String, Node>>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> Result<String, FsError> {
    if !path.starts_with('/') {
        return Err(FsError::Other {
            path: path.to_string(),
            message: "path must be absolute".to_string(),
        });
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

impl MemFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        Self {
            nodes: Mutex::new(nodes),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Node>> {
        // A panic while holding the lock cannot leave a node half-written.
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_parent(nodes: &BTreeMap<String, Node>, path: &str) -> Result<(), FsError> {
        let parent = parent_of(path);
        match nodes.get(parent) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File(_)) => Err(FsError::NotADirectory(parent.to_string())),
            None => Err(FsError::NotFound(parent.to_string())),
        }
    }

    /// Append to a file, creating it when missing.
    ///
    /// Cores flush large outputs in chunks; this is how a native core does it.
    pub fn append(&self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut nodes = self.lock();
        Self::check_parent(&nodes, &path)?;
        match nodes.get_mut(&path) {
            Some(Node::File(existing)) => existing.extend_from_slice(data),
            Some(Node::Dir) => return Err(FsError::IsADirectory(path)),
            None => {
                nodes.insert(path, Node::File(data.to_vec()));
            }
        }
        Ok(())
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize(path).is_ok_and(|path| self.lock().contains_key(&path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        normalize(path).is_ok_and(|path| matches!(self.lock().get(&path), Some(Node::Dir)))
    }

    /// Names of the direct children of a directory.
    pub fn list(&self, dir: &str) -> Vec<String> {
        let Ok(dir) = normalize(dir) else {
            return Vec::new();
        };
        let prefix = if dir == "/" { dir.clone() } else { format!("{}/", dir) };
        self.lock()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect()
    }
}

impl CoreFileSystem for MemFs {
    fn mkdir(&self, path: &str) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut nodes = self.lock();
        if nodes.contains_key(&path) {
            return Err(FsError::AlreadyExists(path));
        }
        Self::check_parent(&nodes, &path)?;
        nodes.insert(path, Node::Dir);
        Ok(())
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut nodes = self.lock();
        if matches!(nodes.get(&path), Some(Node::Dir)) {
            return Err(FsError::IsADirectory(path));
        }
        Self::check_parent(&nodes, &path)?;
        nodes.insert(path, Node::File(data.to_vec()));
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let path = normalize(path)?;
        match self.lock().get(&path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(FsError::IsADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }

    fn unlink(&self, path: &str) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut nodes = self.lock();
        match nodes.get(&path) {
            Some(Node::File(_)) => {
                nodes.remove(&path);
                Ok(())
            }
            Some(Node::Dir) => Err(FsError::IsADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }

    fn file_size(&self, path: &str) -> Result<u64, FsError> {
        let path = normalize(path)?;
        match self.lock().get(&path) {
            Some(Node::File(data)) => Ok(data.len() as u64),
            Some(Node::Dir) => Err(FsError::IsADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_requires_existing_parent() {
        let fs = MemFs::new();
        assert_eq!(
            fs.write_file("/missing/file.bin", b"x"),
            Err(FsError::NotFound("/missing".to_string()))
        );
        fs.mkdir("/missing").unwrap();
        fs.write_file("/missing/file.bin", b"x").unwrap();
        assert_eq!(fs.read_file("/missing/file.bin").unwrap(), b"x");
    }

    #[test]
    fn mkdir_is_single_level() {
        let fs = MemFs::new();
        assert!(matches!(fs.mkdir("/a/b"), Err(FsError::NotFound(_))));
        fs.mkdir("/a").unwrap();
        assert!(matches!(fs.mkdir("/a"), Err(FsError::AlreadyExists(_))));
    }

    #[test]
    fn append_grows_a_file() {
        let fs = MemFs::new();
        fs.append("/out.state", &[1, 2]).unwrap();
        fs.append("/out.state", &[3]).unwrap();
        assert_eq!(fs.file_size("/out.state").unwrap(), 3);
        assert_eq!(fs.read_file("/out.state").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unlink_removes_files_only() {
        let fs = MemFs::new();
        fs.mkdir("/dir").unwrap();
        fs.write_file("/dir/f", b"1").unwrap();
        assert!(matches!(fs.unlink("/dir"), Err(FsError::IsADirectory(_))));
        fs.unlink("/dir/f").unwrap();
        assert!(!fs.exists("/dir/f"));
        assert!(matches!(fs.unlink("/dir/f"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn relative_paths_are_rejected() {
        let fs = MemFs::new();
        assert!(matches!(fs.write_file("rel.txt", b""), Err(FsError::Other { .. })));
    }

    #[test]
    fn list_returns_direct_children() {
        let fs = MemFs::new();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.write_file("/a/x", b"").unwrap();
        fs.write_file("/a/b/y", b"").unwrap();
        let mut names = fs.list("/a");
        names.sort();
        assert_eq!(names, vec!["b".to_string(), "x".to_string()]);
        assert_eq!(fs.list("/"), vec!["a".to_string()]);
    }
}
