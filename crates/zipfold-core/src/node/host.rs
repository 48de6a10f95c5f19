//! Host directories, scanned once on first listing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{ArchiveRoot, ChildMap, FsNode, NodeKind, Timestamps};
use crate::archive::is_archive_path;
use crate::error::{VfsError, VfsResult};

/// A directory on the host filesystem.
///
/// Children are subdirectories and archives; plain files are not shown.
/// The listing is taken once and never refreshed.
#[derive(Debug)]
pub struct HostDirectory {
    path: PathBuf,
    times: Timestamps,
    children: OnceLock<Arc<ChildMap>>,
    scan_lock: Mutex<()>,
}

impl HostDirectory {
    pub(crate) fn new(path: &Path, times: Timestamps) -> Self {
        Self {
            path: path.to_path_buf(),
            times,
            children: OnceLock::new(),
            scan_lock: Mutex::new(()),
        }
    }

    pub fn host_path(&self) -> &Path {
        &self.path
    }

    pub fn times(&self) -> Timestamps {
        self.times
    }

    /// True once the directory has been scanned.
    pub fn is_scanned(&self) -> bool {
        self.children.get().is_some()
    }

    pub(crate) fn children(&self, this: &Arc<FsNode>) -> VfsResult<Arc<ChildMap>> {
        if let Some(children) = self.children.get() {
            return Ok(Arc::clone(children));
        }
        let _scan = self.scan_lock.lock();
        if let Some(children) = self.children.get() {
            return Ok(Arc::clone(children));
        }
        let scanned = Arc::new(scan(&self.path, this)?);
        // Cannot already be set: every writer holds `scan_lock`.
        let _ = self.children.set(Arc::clone(&scanned));
        Ok(scanned)
    }
}

/// Lists `path`: subdirectories under their own names, archives under their
/// stem. An archive whose stem is taken keeps its full file name.
fn scan(path: &Path, this: &Arc<FsNode>) -> VfsResult<ChildMap> {
    let mut directories = Vec::new();
    let mut archives = Vec::new();

    for dirent in fs::read_dir(path).map_err(|e| VfsError::io(path, e))? {
        let dirent = dirent.map_err(|e| VfsError::io(path, e))?;
        let child_path = dirent.path();
        let Ok(file_name) = dirent.file_name().into_string() else {
            debug!(path = %child_path.display(), "Skipping non-UTF-8 name");
            continue;
        };
        // Follows symlinks.
        let meta = match fs::metadata(&child_path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = %child_path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let times = Timestamps::from_metadata(&meta);
        if meta.is_dir() {
            directories.push((file_name, child_path, times));
        } else if meta.is_file() && is_archive_path(&child_path) {
            archives.push((file_name, child_path, times));
        } else {
            trace!(path = %child_path.display(), "Skipping plain file");
        }
    }

    let parent = Arc::downgrade(this);
    let mut children = ChildMap::new();
    for (name, child_path, times) in directories {
        let kind = NodeKind::HostDirectory(HostDirectory::new(&child_path, times));
        children.insert(name.clone(), FsNode::new(name, parent.clone(), kind));
    }
    // Sorted so the stem goes to the same archive on every scan.
    archives.sort_by(|a, b| a.0.cmp(&b.0));
    for (file_name, child_path, times) in archives {
        let stem = Path::new(&file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&file_name)
            .to_owned();
        let name = if children.contains_key(&stem) {
            debug!(archive = %child_path.display(), stem, "Archive stem collides, using full name");
            file_name
        } else {
            stem
        };
        let kind = NodeKind::ArchiveRoot(ArchiveRoot::new(&child_path, times));
        children.insert(name.clone(), FsNode::new(name, parent.clone(), kind));
    }

    debug!(path = %path.display(), children = children.len(), "Scanned host directory");
    Ok(children)
}
