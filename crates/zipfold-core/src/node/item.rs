//! Files inside an archive.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::trace;

use super::Timestamps;
use crate::archive::ArchiveEntry;
use crate::error::VfsResult;
use crate::large_file::copy_range;
use crate::service::CacheService;

/// One file entry of an archive.
///
/// Content is not held here. Reads go through the small-file cache for
/// entries below the cutoff and through the large-file cache otherwise.
/// Entries that do not fit the large-file cache are streamed uncached.
#[derive(Debug)]
pub struct ArchiveItem {
    archive: Arc<Path>,
    /// Stored name, used verbatim to reopen the entry.
    entry_name: String,
    size: u64,
    modified: Option<SystemTime>,
}

impl ArchiveItem {
    pub(crate) fn new(archive: Arc<Path>, entry: &ArchiveEntry) -> Self {
        Self {
            archive,
            entry_name: entry.name.clone(),
            size: entry.size,
            modified: entry.modified,
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn times(&self) -> Timestamps {
        Timestamps::uniform(self.modified)
    }

    pub(crate) fn read(&self, offset: u64, buf: &mut [u8], cache: &CacheService) -> VfsResult<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let copied = if cache.is_small(self.size) {
            cache.with_small_file(&self.archive, &self.entry_name, self.size, |bytes| {
                copy_range(bytes, offset, buf)
            })?
        } else if cache.fits_large_cache(self.size) {
            cache.with_large_file(&self.archive, &self.entry_name, self.size, |entry| {
                entry.read_at(offset, buf)
            })?
        } else {
            cache.read_uncached(&self.archive, &self.entry_name, offset, buf)?
        };
        trace!(entry = %self.entry_name, offset, copied, "Read archive item");
        Ok(copied)
    }
}
