//! The virtual filesystem tree.
//!
//! Every node is an [`FsNode`]: a name, a weak link to its parent and a
//! [`NodeKind`]. Directory kinds produce their children lazily:
//!
//! - [`HostDirectory`] scans the host directory once and keeps the result.
//! - [`ArchiveRoot`] keeps nothing itself. Its children live in the shape
//!   cache and are rebuilt from the archive whenever they have been evicted.
//! - [`ArchiveDirectory`] is built together with its archive root and holds
//!   its children directly.
//!
//! Leaf kinds ([`ArchiveItem`] and [`MetadataFile`]) have no children and no
//! way to add any.
//!
//! Node identity is not stable across shape-cache evictions: a second listing
//! of an archive may return fresh node objects. Nodes handed out earlier stay
//! usable because they only carry the archive path and entry name.

mod archive;
mod host;
mod item;
mod metadata;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use serde::Serialize;

pub use self::archive::{ArchiveDirectory, ArchiveRoot};
pub use self::host::HostDirectory;
pub use self::item::ArchiveItem;
pub use self::metadata::{DESKTOP_INI_NAME, MetadataFile, desktop_ini};

use crate::archive::is_archive_path;
use crate::error::{VfsError, VfsResult};
use crate::service::CacheService;

/// Children of a directory node, ordered by name.
pub type ChildMap = BTreeMap<String, Arc<FsNode>>;

/// What node methods need from their surroundings.
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    pub cache: &'a CacheService,
    /// Add a synthetic `desktop.ini` to every archive root.
    pub folder_metadata: bool,
}

/// File times shown to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timestamps {
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
}

impl Timestamps {
    /// All three times set to `time`; archives only record one.
    pub fn uniform(time: Option<SystemTime>) -> Self {
        Self {
            created: time,
            modified: time,
            accessed: time,
        }
    }

    pub(crate) fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self {
            created: meta.created().ok(),
            modified: meta.modified().ok(),
            accessed: meta.accessed().ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Directory,
    File,
}

/// Windows-style attribute flags.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileAttributes {
    pub read_only: bool,
    pub hidden: bool,
    pub system: bool,
    pub archive: bool,
}

impl FileAttributes {
    pub const READ_ONLY: Self = Self {
        read_only: true,
        hidden: false,
        system: false,
        archive: false,
    };
}

/// Stat record for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
    pub attributes: FileAttributes,
    #[serde(flatten)]
    pub times: Timestamps,
}

impl FileInfo {
    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// POSIX mode bits: everything is read-only.
    pub fn mode(&self) -> u32 {
        match self.kind {
            FileKind::Directory => 0o040_555,
            FileKind::File => 0o100_444,
        }
    }
}

/// The kind-specific part of a node.
#[derive(Debug)]
pub enum NodeKind {
    HostDirectory(HostDirectory),
    ArchiveRoot(ArchiveRoot),
    ArchiveDirectory(ArchiveDirectory),
    ArchiveItem(ArchiveItem),
    Metadata(MetadataFile),
}

/// One node of the virtual tree.
#[derive(Debug)]
pub struct FsNode {
    name: String,
    parent: Weak<FsNode>,
    kind: NodeKind,
}

impl FsNode {
    pub(crate) fn new(name: impl Into<String>, parent: Weak<FsNode>, kind: NodeKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent,
            kind,
        })
    }

    /// Builds the root node for a host directory or a single archive file.
    pub fn root(path: &Path) -> VfsResult<Arc<Self>> {
        let meta = std::fs::metadata(path).map_err(|e| VfsError::io(path, e))?;
        let times = Timestamps::from_metadata(&meta);
        let kind = if meta.is_dir() {
            NodeKind::HostDirectory(HostDirectory::new(path, times))
        } else if is_archive_path(path) {
            NodeKind::ArchiveRoot(ArchiveRoot::new(path, times))
        } else {
            return Err(VfsError::NotADirectory(path.display().to_string()));
        };
        Ok(Self::new(String::new(), Weak::new(), kind))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<Arc<FsNode>> {
        self.parent.upgrade()
    }

    pub fn is_directory(&self) -> bool {
        match &self.kind {
            NodeKind::HostDirectory(_) | NodeKind::ArchiveRoot(_) | NodeKind::ArchiveDirectory(_) => true,
            NodeKind::ArchiveItem(_) | NodeKind::Metadata(_) => false,
        }
    }

    /// Logical path from the root, `/`-separated.
    ///
    /// Nodes whose ancestors have been dropped report the part that is still
    /// reachable.
    pub fn path(&self) -> String {
        let mut names = vec![self.name.as_str()];
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            ancestors.push(node);
        }
        names.extend(ancestors.iter().map(|node| node.name.as_str()));
        let mut path = String::new();
        for name in names.iter().rev().filter(|name| !name.is_empty()) {
            path.push('/');
            path.push_str(name);
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }

    /// Children of a directory node.
    pub fn children(self: &Arc<Self>, ctx: NodeContext<'_>) -> VfsResult<Arc<ChildMap>> {
        match &self.kind {
            NodeKind::HostDirectory(dir) => dir.children(self),
            NodeKind::ArchiveRoot(root) => root.children(self, ctx),
            NodeKind::ArchiveDirectory(dir) => Ok(dir.children()),
            NodeKind::ArchiveItem(_) | NodeKind::Metadata(_) => Err(VfsError::NotADirectory(self.path())),
        }
    }

    /// Looks up one child by exact name.
    pub fn child(self: &Arc<Self>, name: &str, ctx: NodeContext<'_>) -> VfsResult<Option<Arc<FsNode>>> {
        Ok(self.children(ctx)?.get(name).cloned())
    }

    /// Reads file content at `offset` into `buf`, returning the bytes copied.
    pub fn read(&self, offset: u64, buf: &mut [u8], ctx: NodeContext<'_>) -> VfsResult<usize> {
        match &self.kind {
            NodeKind::ArchiveItem(item) => item.read(offset, buf, ctx.cache),
            NodeKind::Metadata(file) => Ok(file.read(offset, buf)),
            NodeKind::HostDirectory(_) | NodeKind::ArchiveRoot(_) | NodeKind::ArchiveDirectory(_) => {
                Err(VfsError::IsADirectory(self.path()))
            }
        }
    }

    pub fn info(&self) -> FileInfo {
        let (kind, size, attributes, times) = match &self.kind {
            NodeKind::HostDirectory(dir) => (FileKind::Directory, 0, FileAttributes::READ_ONLY, dir.times()),
            NodeKind::ArchiveRoot(root) => (FileKind::Directory, 0, FileAttributes::READ_ONLY, root.times()),
            NodeKind::ArchiveDirectory(dir) => (FileKind::Directory, 0, FileAttributes::READ_ONLY, dir.times()),
            NodeKind::ArchiveItem(item) => (FileKind::File, item.size(), FileAttributes::READ_ONLY, item.times()),
            NodeKind::Metadata(file) => (FileKind::File, file.len(), file.attributes(), Timestamps::default()),
        };
        FileInfo {
            name: self.name.clone(),
            kind,
            size,
            attributes,
            times,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_info_mode() {
        let dir = FileInfo {
            name: "d".into(),
            kind: FileKind::Directory,
            size: 0,
            attributes: FileAttributes::READ_ONLY,
            times: Timestamps::default(),
        };
        assert_eq!(dir.mode(), 0o040_555);
        let file = FileInfo {
            kind: FileKind::File,
            ..dir
        };
        assert_eq!(file.mode(), 0o100_444);
    }

    #[test]
    fn test_path_walks_parents() {
        let root = FsNode::new("", Weak::new(), NodeKind::Metadata(MetadataFile::new(b"", FileAttributes::READ_ONLY)));
        let child = FsNode::new(
            "a",
            Arc::downgrade(&root),
            NodeKind::Metadata(MetadataFile::new(b"", FileAttributes::READ_ONLY)),
        );
        let grandchild = FsNode::new(
            "b.txt",
            Arc::downgrade(&child),
            NodeKind::Metadata(MetadataFile::new(b"", FileAttributes::READ_ONLY)),
        );
        assert_eq!(root.path(), "/");
        assert_eq!(grandchild.path(), "/a/b.txt");

        drop(child);
        assert_eq!(grandchild.path(), "/b.txt");
    }

    #[test]
    fn test_leaf_has_no_children() {
        let leaf = FsNode::new("x", Weak::new(), NodeKind::Metadata(MetadataFile::new(b"abc", FileAttributes::READ_ONLY)));
        let cache = CacheService::new(&crate::FsConfig::default());
        let ctx = NodeContext {
            cache: &cache,
            folder_metadata: false,
        };
        assert!(matches!(leaf.children(ctx), Err(VfsError::NotADirectory(_))));
        let mut buf = [0u8; 8];
        assert_eq!(leaf.read(1, &mut buf, ctx).unwrap(), 2);
        assert_eq!(&buf[..2], b"bc");
    }
}
