//! Path-based façade over the node tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::cache::CacheStatsSnapshot;
use crate::compactor::Compactor;
use crate::config::FsConfig;
use crate::error::{VfsError, VfsResult};
use crate::node::{FileInfo, FsNode, NodeContext};
use crate::service::CacheService;

/// Splits a virtual path on `/` and `\`, dropping empty components.
///
/// ```
/// assert_eq!(zipfold_core::fs::split_path("\\a//b/"), vec!["a", "b"]);
/// assert!(zipfold_core::fs::split_path("/").is_empty());
/// ```
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|part| !part.is_empty()).collect()
}

/// A read-only filesystem over a host directory and the archives in it.
///
/// Every operation takes a virtual path relative to the root. The root is
/// named by the empty path or `/`.
pub struct ArchiveFs {
    root_path: PathBuf,
    root: Arc<FsNode>,
    cache: Arc<CacheService>,
    config: FsConfig,
    compactor: Mutex<Option<Compactor>>,
}

impl ArchiveFs {
    /// Validates `config` and mounts `root`, which may be a directory or a
    /// single archive.
    pub fn new(root: impl AsRef<Path>, config: FsConfig) -> VfsResult<Self> {
        config.validate()?;
        let root_path = root.as_ref().to_path_buf();
        let root = FsNode::root(&root_path)?;
        let cache = Arc::new(CacheService::new(&config));
        info!(root = %root_path.display(), "Opened archive filesystem");
        Ok(Self {
            root_path,
            root,
            cache,
            config,
            compactor: Mutex::new(None),
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn root(&self) -> &Arc<FsNode> {
        &self.root
    }

    fn ctx(&self) -> NodeContext<'_> {
        NodeContext {
            cache: &self.cache,
            folder_metadata: self.config.folder_metadata,
        }
    }

    /// Resolves `path` to its node.
    pub fn lookup(&self, path: &str) -> VfsResult<Arc<FsNode>> {
        let mut node = Arc::clone(&self.root);
        for part in split_path(path) {
            let next = match node.child(part, self.ctx()) {
                Ok(Some(child)) => child,
                Ok(None) => {
                    debug!(path, missing = part, "Lookup failed");
                    return Err(VfsError::NotFound(path.to_owned()));
                }
                Err(VfsError::NotADirectory(_)) => return Err(VfsError::NotADirectory(path.to_owned())),
                Err(e) => return Err(e),
            };
            node = next;
        }
        Ok(node)
    }

    /// Copies file content starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied, 0 at or past the end of the file.
    #[instrument(level = "debug", skip(self, buf), fields(len = buf.len()))]
    pub fn read_file(&self, path: &str, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        self.lookup(path)?.read(offset, buf, self.ctx())
    }

    /// Stat records for the children of a directory, ordered by name.
    pub fn list_children(&self, path: &str) -> VfsResult<Vec<FileInfo>> {
        let node = self.lookup(path)?;
        let children = node
            .children(self.ctx())
            .map_err(|e| match e {
                VfsError::NotADirectory(_) => VfsError::NotADirectory(path.to_owned()),
                other => other,
            })?;
        Ok(children.values().map(|child| child.info()).collect())
    }

    pub fn file_info(&self, path: &str) -> VfsResult<FileInfo> {
        Ok(self.lookup(path)?.info())
    }

    /// Always fails: the tree is read-only.
    pub fn write_file(&self, path: &str, _data: &[u8], _offset: u64) -> VfsResult<usize> {
        self.lookup(path)?;
        Err(VfsError::Unsupported("write"))
    }

    /// Shrinks the file caches to the configured ratio of their limits.
    pub fn compact(&self) -> VfsResult<usize> {
        Ok(self.cache.compact(self.config.compact_ratio)?)
    }

    /// Starts periodic compaction at the configured interval.
    ///
    /// Returns `false` if a compactor is already running or the interval is
    /// zero.
    pub fn start_compactor(&self) -> VfsResult<bool> {
        let mut slot = self.compactor.lock();
        if slot.is_some() || self.config.compact_interval.is_zero() {
            return Ok(false);
        }
        let compactor = Compactor::spawn(
            Arc::clone(&self.cache),
            self.config.compact_interval,
            self.config.compact_ratio,
        )
        .map_err(|e| VfsError::io(&self.root_path, e))?;
        *slot = Some(compactor);
        Ok(true)
    }

    pub fn stop_compactor(&self) {
        // Joined outside the lock.
        let compactor = self.compactor.lock().take();
        drop(compactor);
    }

    pub fn cache_stats(&self) -> Vec<CacheStatsSnapshot> {
        self.cache.stats()
    }

    /// Directory that receives temp files for large entries.
    pub fn large_file_dir(&self) -> &Path {
        self.cache.large_file_dir()
    }
}

impl Drop for ArchiveFs {
    fn drop(&mut self) {
        self.stop_compactor();
        self.cache.dispose();
    }
}

impl std::fmt::Debug for ArchiveFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFs")
            .field("root_path", &self.root_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("a/b\\c"), ["a", "b", "c"]);
        assert!(split_path("").is_empty());
        assert!(split_path("//\\").is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = ArchiveFs::new(dir.path(), FsConfig::default().max_readers_per_archive(0)).unwrap_err();
        assert!(matches!(err, VfsError::Config(_)));
        assert_eq!(err.to_errno(), libc::EINVAL);
    }

    #[test]
    fn test_plain_file_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ArchiveFs::new(&file, FsConfig::default()),
            Err(VfsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_root_lookup() {
        let dir = TempDir::new().unwrap();
        let fs = ArchiveFs::new(dir.path(), FsConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&fs.lookup("").unwrap(), fs.root()));
        assert!(Arc::ptr_eq(&fs.lookup("/").unwrap(), fs.root()));
        assert!(fs.file_info("/").unwrap().is_directory());
        assert!(fs.list_children("/").unwrap().is_empty());
        assert!(matches!(fs.lookup("/missing"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn test_compactor_lifecycle() {
        let dir = TempDir::new().unwrap();
        let fs = ArchiveFs::new(
            dir.path(),
            FsConfig::default().compact_interval(Duration::from_millis(10)),
        )
        .unwrap();
        assert!(fs.start_compactor().unwrap());
        assert!(!fs.start_compactor().unwrap());
        fs.stop_compactor();
        assert!(fs.start_compactor().unwrap());

        let disabled = ArchiveFs::new(dir.path(), FsConfig::default().compact_interval(Duration::ZERO)).unwrap();
        assert!(!disabled.start_compactor().unwrap());
    }
}
