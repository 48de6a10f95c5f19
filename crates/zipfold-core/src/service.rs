//! The four caches behind the filesystem.
//!
//! | cache          | key                  | value                    | size unit   |
//! |----------------|----------------------|--------------------------|-------------|
//! | small files    | archive + entry name | `Vec<u8>`                | bytes       |
//! | large files    | archive + entry name | [`LargeFileEntry`]       | bytes       |
//! | shapes         | archive path         | archive root's children  | entries     |
//! | archive pools  | archive path         | [`ArchivePool`]          | 1 per pool  |
//!
//! Nested borrows always cross cache instances (file → pool, shape → pool),
//! never two keys of the same cache, which keeps eviction deadlock-free.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::{ArchivePool, ArchiveReader};
use crate::cache::{CacheStatsSnapshot, LruCache};
use crate::config::FsConfig;
use crate::error::{ArchiveError, CacheError, VfsResult};
use crate::large_file::LargeFileEntry;
use crate::node::ChildMap;

/// Separates archive path and entry name in file cache keys.
const KEY_SEPARATOR: char = '\u{1f}';

/// Attempts to obtain a reader when pools keep getting evicted under us.
const POOL_RETRIES: usize = 3;

/// Cache key for one entry of one archive.
pub fn file_key(archive: &Path, entry: &str) -> String {
    let archive = archive.to_string_lossy();
    let mut key = String::with_capacity(archive.len() + 1 + entry.len());
    key.push_str(&archive);
    key.push(KEY_SEPARATOR);
    key.push_str(entry);
    key
}

/// Pool-cache value. Closing on drop means an evicted pool stops handing out
/// readers even while callers still hold the `Arc`.
struct PoolSlot(Arc<ArchivePool>);

impl Drop for PoolSlot {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Owns the file, shape and archive-pool caches.
pub struct CacheService {
    small_files: LruCache<String, Vec<u8>>,
    large_files: LruCache<String, LargeFileEntry>,
    shapes: LruCache<PathBuf, Arc<ChildMap>>,
    pools: LruCache<PathBuf, PoolSlot>,
    small_file_cutoff: u64,
    max_readers: usize,
    large_file_dir: PathBuf,
}

impl CacheService {
    pub fn new(config: &FsConfig) -> Self {
        let large_file_dir = config.large_file_dir();
        info!(
            small_file_cache = config.small_file_cache_bytes,
            large_file_cache = config.large_file_cache_bytes,
            cutoff = config.small_file_cutoff_bytes,
            large_file_dir = %large_file_dir.display(),
            max_readers = config.max_readers_per_archive,
            "Initializing cache service"
        );
        Self {
            small_files: LruCache::new("small-files", config.small_file_cache_bytes),
            large_files: LruCache::new("large-files", config.large_file_cache_bytes),
            shapes: LruCache::new("shapes", config.shape_cache_entries),
            pools: LruCache::new("archive-pools", config.archive_pool_cache_size),
            small_file_cutoff: config.small_file_cutoff_bytes,
            max_readers: config.max_readers_per_archive,
            large_file_dir,
        }
    }

    /// The reader pool for `archive`, creating it on first use.
    ///
    /// The pool-cache borrow ends before this returns, so callers reading
    /// through the pool do not serialize on the pool cache's token.
    pub fn archive_pool(&self, archive: &Path) -> Result<Arc<ArchivePool>, CacheError> {
        let max_readers = self.max_readers;
        self.pools.with_value(
            archive.to_path_buf(),
            1,
            || {
                debug!(archive = %archive.display(), max_readers, "Creating reader pool");
                Ok::<_, Infallible>(PoolSlot(Arc::new(ArchivePool::new(archive, max_readers))))
            },
            |slot| Arc::clone(&slot.0),
        )
    }

    /// Runs `f` with a pooled reader for `archive`.
    pub fn with_reader<R>(
        &self,
        archive: &Path,
        f: impl FnOnce(&mut ArchiveReader) -> Result<R, ArchiveError>,
    ) -> VfsResult<R> {
        for attempt in 1..=POOL_RETRIES {
            let pool = self.archive_pool(archive)?;
            match pool.checkout() {
                Ok(mut reader) => return Ok(f(&mut reader)?),
                Err(ArchiveError::PoolClosed { .. }) => {
                    debug!(archive = %archive.display(), attempt, "Reader pool closed under us, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ArchiveError::PoolClosed {
            path: archive.to_path_buf(),
        }
        .into())
    }

    /// True if an entry of `size` bytes is served from memory.
    pub fn is_small(&self, size: u64) -> bool {
        size < self.small_file_cutoff
    }

    /// True if a large entry of `size` bytes can be held by the large-file cache.
    pub fn fits_large_cache(&self, size: u64) -> bool {
        size < self.large_files.size_limit()
    }

    /// Reads a range of an entry straight from the archive, caching nothing.
    ///
    /// Serves entries too large for the large-file cache. Every call
    /// decompresses from the start of the entry up to `offset + buf.len()`.
    pub fn read_uncached(&self, archive: &Path, entry: &str, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        self.with_reader(archive, |reader| reader.read_entry_range(entry, offset, buf))
    }

    /// Borrows the buffered bytes of a small entry and passes them to `f`.
    pub fn with_small_file<R>(
        &self,
        archive: &Path,
        entry: &str,
        size: u64,
        f: impl FnOnce(&[u8]) -> R,
    ) -> VfsResult<R> {
        let factory = || self.with_reader(archive, |reader| reader.read_entry(entry));
        Ok(self
            .small_files
            .with_value(file_key(archive, entry), size, factory, |bytes| f(bytes))?)
    }

    /// Borrows the mapped copy of a large entry and passes it to `f`.
    pub fn with_large_file<R>(
        &self,
        archive: &Path,
        entry: &str,
        size: u64,
        f: impl FnOnce(&LargeFileEntry) -> R,
    ) -> VfsResult<R> {
        let factory = || {
            LargeFileEntry::create_with(&self.large_file_dir, |out| {
                self.with_reader(archive, |reader| reader.copy_entry(entry, out))
            })
        };
        Ok(self
            .large_files
            .with_value(file_key(archive, entry), size, factory, f)?)
    }

    /// Children of an archive root, built by `build` on a miss.
    ///
    /// `entries` sizes the shape in the cache. A shape too large for the cache
    /// is built without caching.
    pub fn shape(
        &self,
        archive: &Path,
        entries: u64,
        build: impl FnOnce() -> VfsResult<ChildMap>,
    ) -> VfsResult<Arc<ChildMap>> {
        let size = entries.max(1);
        if size >= self.shapes.size_limit() {
            warn!(
                archive = %archive.display(),
                entries,
                limit = self.shapes.size_limit(),
                "Archive listing exceeds shape cache, building uncached"
            );
            return build().map(Arc::new);
        }
        let factory = || build().map(Arc::new);
        Ok(self
            .shapes
            .with_value(archive.to_path_buf(), size, factory, Arc::clone)?)
    }

    /// Shrinks the small-file and large-file caches to `target_ratio` of their limits.
    pub fn compact(&self, target_ratio: f64) -> Result<usize, CacheError> {
        let small = self.small_files.compact(target_ratio)?;
        let large = self.large_files.compact(target_ratio)?;
        if small + large > 0 {
            debug!(small, large, target_ratio, "Compacted file caches");
        }
        Ok(small + large)
    }

    /// Tears down all four caches. Idempotent.
    pub fn dispose(&self) {
        self.small_files.dispose();
        self.large_files.dispose();
        self.shapes.dispose();
        self.pools.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.small_files.is_disposed()
    }

    pub fn stats(&self) -> Vec<CacheStatsSnapshot> {
        vec![
            self.small_files.stats(),
            self.large_files.stats(),
            self.shapes.stats(),
            self.pools.stats(),
        ]
    }

    pub fn large_file_dir(&self) -> &Path {
        &self.large_file_dir
    }
}

impl Drop for CacheService {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("small_files", &self.small_files)
            .field("large_files", &self.large_files)
            .field("shapes", &self.shapes)
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}
