//! Read-only virtual filesystem over host directories and ZIP archives.
//!
//! A host directory is presented as a tree in which every `.zip` file
//! appears as a folder holding the archive's contents. Nothing is extracted
//! up front: listings and file contents are produced on demand and kept in
//! bounded caches.
//!
//! # Components
//!
//! - [`cache::LruCache`] - size-bounded LRU cache whose entries are borrowed
//!   exclusively through RAII handles and built lazily on first access
//! - [`archive::ArchivePool`] - bounded set of ZIP readers per archive
//! - [`service::CacheService`] - the small-file, large-file, shape and
//!   archive-pool caches wired together
//! - [`node::FsNode`] - the lazily materialized node tree
//! - [`ArchiveFs`] - path-based façade (`read_file`, `list_children`,
//!   `file_info`) with optional background compaction
//!
//! # Example
//!
//! ```no_run
//! use zipfold_core::{ArchiveFs, FsConfig};
//!
//! let fs = ArchiveFs::new("/srv/backups", FsConfig::default())?;
//! for child in fs.list_children("/2024")? {
//!     println!("{} {}", child.name, child.size);
//! }
//! let mut buf = vec![0u8; 4096];
//! let n = fs.read_file("/2024/photos/readme.txt", &mut buf, 0)?;
//! # Ok::<(), zipfold_core::VfsError>(())
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod archive;
pub mod cache;
pub mod compactor;
pub mod config;
pub mod error;
pub mod fs;
pub mod large_file;
pub mod node;
pub mod service;

pub use cache::{CacheHandle, CacheStats, CacheStatsSnapshot, LruCache};
pub use compactor::Compactor;
pub use config::{ConfigError, FsConfig};
pub use error::{ArchiveError, CacheError, VfsError, VfsResult, io_error_to_errno};
pub use fs::ArchiveFs;
pub use large_file::LargeFileEntry;
pub use node::{FileAttributes, FileInfo, FileKind, FsNode, NodeKind};
pub use service::CacheService;
