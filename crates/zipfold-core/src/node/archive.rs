//! Archive roots and the directories folded out of an archive listing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, Weak};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::metadata::{DESKTOP_INI_NAME, MetadataFile, desktop_ini};
use super::{ArchiveItem, ChildMap, FsNode, NodeContext, NodeKind, Timestamps};
use crate::archive::ArchiveEntry;
use crate::error::VfsResult;

/// An archive file shown as a directory.
///
/// The folded listing lives in the shape cache, keyed by the archive path.
#[derive(Debug)]
pub struct ArchiveRoot {
    path: Arc<Path>,
    times: Timestamps,
    /// Central-directory entry count; sizes the listing in the shape cache.
    entry_count: OnceLock<u64>,
}

impl ArchiveRoot {
    pub(crate) fn new(path: &Path, times: Timestamps) -> Self {
        Self {
            path: Arc::from(path),
            times,
            entry_count: OnceLock::new(),
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.path
    }

    pub fn times(&self) -> Timestamps {
        self.times
    }

    fn entry_count(&self, ctx: NodeContext<'_>) -> VfsResult<u64> {
        if let Some(count) = self.entry_count.get() {
            return Ok(*count);
        }
        let count = ctx.cache.with_reader(&self.path, |reader| Ok(reader.len() as u64))?;
        Ok(*self.entry_count.get_or_init(|| count))
    }

    pub(crate) fn children(&self, this: &Arc<FsNode>, ctx: NodeContext<'_>) -> VfsResult<Arc<ChildMap>> {
        let entries = self.entry_count(ctx)?;
        ctx.cache.shape(&self.path, entries, || {
            let listing = ctx.cache.with_reader(&self.path, |reader| reader.entries())?;
            let mut children = fold_entries(&self.path, &listing, &Arc::downgrade(this));
            if ctx.folder_metadata {
                children.entry(DESKTOP_INI_NAME.to_owned()).or_insert_with(|| {
                    FsNode::new(
                        DESKTOP_INI_NAME,
                        Arc::downgrade(this),
                        NodeKind::Metadata(MetadataFile::new(desktop_ini(), MetadataFile::SHELL_ATTRIBUTES)),
                    )
                });
            }
            debug!(
                archive = %self.path.display(),
                entries = listing.len(),
                top_level = children.len(),
                "Folded archive listing"
            );
            Ok(children)
        })
    }
}

/// A directory inside an archive, explicit or implied by an entry path.
#[derive(Debug)]
pub struct ArchiveDirectory {
    children: Arc<ChildMap>,
    modified: Option<SystemTime>,
}

impl ArchiveDirectory {
    pub fn children(&self) -> Arc<ChildMap> {
        Arc::clone(&self.children)
    }

    pub fn times(&self) -> Timestamps {
        Timestamps::uniform(self.modified)
    }
}

/// Intermediate tree used while folding; nodes need their parent's `Arc`,
/// which only exists once the whole subtree is known.
enum Pending<'a> {
    Directory {
        children: BTreeMap<&'a str, Pending<'a>>,
        modified: Option<SystemTime>,
    },
    File(&'a ArchiveEntry),
}

impl<'a> Pending<'a> {
    fn directory(modified: Option<SystemTime>) -> Self {
        Pending::Directory {
            children: BTreeMap::new(),
            modified,
        }
    }
}

/// Folds a flat entry listing into a tree.
///
/// Missing intermediate directories are created and stamped with the time of
/// the entry that implied them. The first entry to claim a name wins; an
/// entry that needs an existing file as its directory is skipped.
fn fold_entries(archive: &Path, listing: &[ArchiveEntry], parent: &Weak<FsNode>) -> ChildMap {
    let mut top: BTreeMap<&str, Pending<'_>> = BTreeMap::new();

    'entries: for entry in listing {
        let parts = entry.components();
        let Some((last, dirs)) = parts.split_last() else {
            debug!(archive = %archive.display(), entry = %entry.name, "Skipping entry without a name");
            continue;
        };

        let mut level = &mut top;
        for part in dirs {
            let slot = level.entry(*part).or_insert_with(|| Pending::directory(entry.modified));
            match slot {
                Pending::Directory { children, .. } => level = children,
                Pending::File(_) => {
                    warn!(
                        archive = %archive.display(),
                        entry = %entry.name,
                        conflict = *part,
                        "Entry path runs through a file, skipping"
                    );
                    continue 'entries;
                }
            }
        }

        level.entry(*last).or_insert_with(|| {
            if entry.denotes_directory() {
                Pending::directory(entry.modified)
            } else {
                Pending::File(entry)
            }
        });
    }

    let archive: Arc<Path> = Arc::from(archive);
    materialize(&archive, top, parent)
}

fn materialize(archive: &Arc<Path>, level: BTreeMap<&str, Pending<'_>>, parent: &Weak<FsNode>) -> ChildMap {
    level
        .into_iter()
        .map(|(name, pending)| {
            let node = match pending {
                Pending::Directory { children, modified } => Arc::new_cyclic(|this| FsNode {
                    name: name.to_owned(),
                    parent: parent.clone(),
                    kind: NodeKind::ArchiveDirectory(ArchiveDirectory {
                        children: Arc::new(materialize(archive, children, this)),
                        modified,
                    }),
                }),
                Pending::File(entry) => FsNode::new(
                    name,
                    parent.clone(),
                    NodeKind::ArchiveItem(ArchiveItem::new(Arc::clone(archive), entry)),
                ),
            };
            (name.to_owned(), node)
        })
        .collect()
}
