//! Error types for the archive filesystem.
//!
//! Errors are layered the same way the filesystem is:
//!
//! - [`CacheError`] comes out of the LRU engine and is `Clone`, because a
//!   failed value construction is remembered in the slot and handed to every
//!   later borrower of that key.
//! - [`ArchiveError`] describes failures opening or reading ZIP archives.
//! - [`VfsError`] is what the façade returns. [`VfsError::to_errno`] turns it
//!   into the POSIX status a FUSE-style driver hands back to the kernel.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use zip::result::ZipError;

use crate::config::ConfigError;

/// Boxed error produced by value factories.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised by [`LruCache`](crate::cache::LruCache).
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache has been torn down.
    #[error("cache `{cache}` has been disposed")]
    Disposed { cache: &'static str },

    /// A single entry would not fit even in an empty cache.
    #[error("entry of size {size} does not fit in cache `{cache}` (limit {limit})")]
    Oversized {
        cache: &'static str,
        size: u64,
        limit: u64,
    },

    /// The value factory failed. The failure stays cached until the slot is evicted.
    #[error("value construction failed")]
    Construction(#[source] Arc<dyn StdError + Send + Sync + 'static>),

    /// A previous borrower panicked while building the value.
    #[error("value construction was interrupted by a panic")]
    ConstructionAborted,

    /// Bookkeeping inside the cache no longer adds up.
    #[error("cache `{cache}` invariant violated: {detail}")]
    InvariantViolation { cache: &'static str, detail: String },
}

impl CacheError {
    /// Wraps a factory error for storage in a slot.
    pub fn construction(err: impl Into<BoxError>) -> Self {
        CacheError::Construction(Arc::from(err.into()))
    }

    /// Returns the factory error if this is a construction failure.
    pub fn construction_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            CacheError::Construction(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

/// Errors raised while opening or reading a ZIP archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed archive {}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("entry `{entry}` not found in archive {}", archive.display())]
    EntryNotFound { archive: PathBuf, entry: String },

    #[error("failed to read entry `{entry}` from archive {}", archive.display())]
    Io {
        archive: PathBuf,
        entry: String,
        #[source]
        source: io::Error,
    },

    /// The pool was evicted from the pool cache while a caller still held it.
    #[error("reader pool for {} has been closed", path.display())]
    PoolClosed { path: PathBuf },
}

/// Errors returned by the filesystem façade and node tree.
#[derive(Debug, Error)]
pub enum VfsError {
    /// A path component does not exist.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A directory operation was attempted on a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file operation was attempted on a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// The node kind does not support the operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl VfsError {
    /// Converts this error to a libc error code.
    ///
    /// A failed value construction reports `ENOENT`: the entry could not be
    /// produced, so from the caller's point of view it is not there.
    pub fn to_errno(&self) -> i32 {
        match self {
            VfsError::NotFound(_) => libc::ENOENT,
            VfsError::NotADirectory(_) => libc::ENOTDIR,
            VfsError::IsADirectory(_) => libc::EISDIR,
            VfsError::Unsupported(_) => libc::ENOTSUP,
            VfsError::Cache(e) => cache_error_to_errno(e),
            VfsError::Archive(e) => archive_error_to_errno(e),
            VfsError::Io { source, .. } => io_error_to_errno(source),
            VfsError::Config(_) => libc::EINVAL,
        }
    }

    /// True for invariant violations, which callers should log loudly.
    pub fn is_internal(&self) -> bool {
        matches!(self, VfsError::Cache(CacheError::InvariantViolation { .. }))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VfsError::Io {
            path: path.into(),
            source,
        }
    }
}

fn cache_error_to_errno(e: &CacheError) -> i32 {
    match e {
        CacheError::Disposed { .. } => libc::ESHUTDOWN,
        CacheError::Oversized { .. } => libc::EFBIG,
        CacheError::Construction(_) | CacheError::ConstructionAborted => libc::ENOENT,
        CacheError::InvariantViolation { .. } => libc::EIO,
    }
}

/// Archive failures read as `ENOENT`, the same status they get when they
/// surface through a cached construction failure.
fn archive_error_to_errno(e: &ArchiveError) -> i32 {
    match e {
        ArchiveError::Open { .. }
        | ArchiveError::Zip { .. }
        | ArchiveError::EntryNotFound { .. }
        | ArchiveError::Io { .. }
        | ArchiveError::PoolClosed { .. } => libc::ENOENT,
    }
}

/// Converts an I/O error to a POSIX errno value.
///
/// This extracts the raw OS error if available, otherwise returns `EIO`.
#[inline]
pub fn io_error_to_errno(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

/// Result type for filesystem operations.
pub type VfsResult<T> = Result<T, VfsError>;
