//! Filesystem configuration.
//!
//! [`FsConfig`] sizes the four caches owned by
//! [`CacheService`](crate::service::CacheService) and controls background
//! compaction. It deserializes from TOML (durations as humantime strings such
//! as `"30s"`), and every field has a default so a config file only needs to
//! name what it overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default small-file cache budget (1 GiB).
pub const DEFAULT_SMALL_FILE_CACHE_BYTES: u64 = 1024 * 1024 * 1024;

/// Default large-file cache budget (10 GiB of temp-file backed maps).
pub const DEFAULT_LARGE_FILE_CACHE_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Entries at or above this size are served from memory-mapped temp files.
pub const DEFAULT_SMALL_FILE_CUTOFF_BYTES: u64 = 100 * 1024 * 1024;

/// Concurrent readers allowed per archive.
pub const DEFAULT_MAX_READERS_PER_ARCHIVE: usize = 4;

/// Number of archive reader pools kept alive.
pub const DEFAULT_ARCHIVE_POOL_CACHE_SIZE: u64 = 30;

/// Total archive entries across all cached archive shapes.
pub const DEFAULT_SHAPE_CACHE_ENTRIES: u64 = 1_000_000;

/// Interval between background compactions.
pub const DEFAULT_COMPACT_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration validation failure.
#[derive(Debug, Error)]
#[error("invalid configuration: {field} {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

/// Configuration for [`ArchiveFs`](crate::ArchiveFs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FsConfig {
    /// Byte budget for fully buffered archive entries.
    pub small_file_cache_bytes: u64,

    /// Byte budget for memory-mapped archive entries.
    pub large_file_cache_bytes: u64,

    /// Entries smaller than this are buffered; the rest are mapped.
    pub small_file_cutoff_bytes: u64,

    /// Directory for large-entry temp files.
    ///
    /// Default: the system temp directory. Created on first use if missing.
    pub large_file_dir: Option<PathBuf>,

    /// Upper bound on open readers per archive.
    pub max_readers_per_archive: usize,

    /// How many archive reader pools stay cached.
    pub archive_pool_cache_size: u64,

    /// Budget for cached archive listings, counted in entries.
    pub shape_cache_entries: u64,

    /// Interval between background compactions.
    #[serde(with = "humantime_serde")]
    pub compact_interval: Duration,

    /// Fraction of each file cache's limit that survives a compaction.
    pub compact_ratio: f64,

    /// Expose a synthetic `desktop.ini` in each archive root so Windows
    /// Explorer shows archives with a folder icon.
    pub folder_metadata: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            small_file_cache_bytes: DEFAULT_SMALL_FILE_CACHE_BYTES,
            large_file_cache_bytes: DEFAULT_LARGE_FILE_CACHE_BYTES,
            small_file_cutoff_bytes: DEFAULT_SMALL_FILE_CUTOFF_BYTES,
            large_file_dir: None,
            max_readers_per_archive: DEFAULT_MAX_READERS_PER_ARCHIVE,
            archive_pool_cache_size: DEFAULT_ARCHIVE_POOL_CACHE_SIZE,
            shape_cache_entries: DEFAULT_SHAPE_CACHE_ENTRIES,
            compact_interval: DEFAULT_COMPACT_INTERVAL,
            compact_ratio: 0.0,
            folder_metadata: false,
        }
    }
}

impl FsConfig {
    /// Checks field relationships that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_readers_per_archive == 0 {
            return Err(ConfigError {
                field: "max_readers_per_archive",
                reason: "must be at least 1".into(),
            });
        }
        if self.archive_pool_cache_size < 2 {
            return Err(ConfigError {
                field: "archive_pool_cache_size",
                reason: "must be at least 2".into(),
            });
        }
        if self.small_file_cutoff_bytes >= self.small_file_cache_bytes {
            return Err(ConfigError {
                field: "small_file_cutoff_bytes",
                reason: format!(
                    "({}) must be below small_file_cache_bytes ({})",
                    self.small_file_cutoff_bytes, self.small_file_cache_bytes
                ),
            });
        }
        if self.large_file_cache_bytes <= self.small_file_cutoff_bytes {
            return Err(ConfigError {
                field: "large_file_cache_bytes",
                reason: format!(
                    "({}) must be above small_file_cutoff_bytes ({})",
                    self.large_file_cache_bytes, self.small_file_cutoff_bytes
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.compact_ratio) {
            return Err(ConfigError {
                field: "compact_ratio",
                reason: format!("({}) must be within 0.0..=1.0", self.compact_ratio),
            });
        }
        Ok(())
    }

    /// Resolved directory for large-entry temp files.
    pub fn large_file_dir(&self) -> PathBuf {
        self.large_file_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Sets the small-file cache budget in bytes.
    #[must_use]
    pub fn small_file_cache_bytes(mut self, bytes: u64) -> Self {
        self.small_file_cache_bytes = bytes;
        self
    }

    /// Sets the large-file cache budget in bytes.
    #[must_use]
    pub fn large_file_cache_bytes(mut self, bytes: u64) -> Self {
        self.large_file_cache_bytes = bytes;
        self
    }

    /// Sets the size at which entries switch to memory-mapped temp files.
    #[must_use]
    pub fn small_file_cutoff_bytes(mut self, bytes: u64) -> Self {
        self.small_file_cutoff_bytes = bytes;
        self
    }

    /// Sets the temp directory for large entries.
    #[must_use]
    pub fn with_large_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.large_file_dir = Some(dir.into());
        self
    }

    /// Sets the per-archive reader bound.
    #[must_use]
    pub fn max_readers_per_archive(mut self, readers: usize) -> Self {
        self.max_readers_per_archive = readers;
        self
    }

    /// Sets how many reader pools stay cached.
    #[must_use]
    pub fn archive_pool_cache_size(mut self, pools: u64) -> Self {
        self.archive_pool_cache_size = pools;
        self
    }

    /// Sets the shape cache budget in archive entries.
    #[must_use]
    pub fn shape_cache_entries(mut self, entries: u64) -> Self {
        self.shape_cache_entries = entries;
        self
    }

    /// Sets the background compaction interval.
    #[must_use]
    pub fn compact_interval(mut self, interval: Duration) -> Self {
        self.compact_interval = interval;
        self
    }

    /// Sets the ratio of each file cache kept after compaction.
    #[must_use]
    pub fn compact_ratio(mut self, ratio: f64) -> Self {
        self.compact_ratio = ratio;
        self
    }

    /// Enables or disables the synthetic `desktop.ini` in archive roots.
    #[must_use]
    pub fn folder_metadata(mut self, enabled: bool) -> Self {
        self.folder_metadata = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FsConfig::default();
        assert_eq!(config.small_file_cache_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.large_file_cache_bytes, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.small_file_cutoff_bytes, 100 * 1024 * 1024);
        assert_eq!(config.max_readers_per_archive, 4);
        assert_eq!(config.archive_pool_cache_size, 30);
        assert_eq!(config.compact_interval, Duration::from_secs(30));
        assert!(!config.folder_metadata);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = FsConfig::default()
            .small_file_cache_bytes(4096)
            .small_file_cutoff_bytes(1024)
            .max_readers_per_archive(2)
            .with_large_file_dir("/var/tmp/zipfold")
            .folder_metadata(true);
        assert_eq!(config.small_file_cache_bytes, 4096);
        assert_eq!(config.small_file_cutoff_bytes, 1024);
        assert_eq!(config.max_readers_per_archive, 2);
        assert_eq!(config.large_file_dir(), PathBuf::from("/var/tmp/zipfold"));
        assert!(config.folder_metadata);
    }

    #[test]
    fn test_validate_rejects_cutoff_above_cache() {
        let config = FsConfig::default()
            .small_file_cache_bytes(1000)
            .small_file_cutoff_bytes(1000);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "small_file_cutoff_bytes");
    }

    #[test]
    fn test_validate_rejects_large_cache_below_cutoff() {
        let config = FsConfig::default()
            .small_file_cache_bytes(4096)
            .small_file_cutoff_bytes(1024)
            .large_file_cache_bytes(1000);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "large_file_cache_bytes");

        assert!(config.large_file_cache_bytes(1024).validate().is_err());
        assert!(
            FsConfig::default()
                .small_file_cache_bytes(4096)
                .small_file_cutoff_bytes(1024)
                .large_file_cache_bytes(1025)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_zero_readers() {
        let err = FsConfig::default()
            .max_readers_per_archive(0)
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "max_readers_per_archive");
    }

    #[test]
    fn test_validate_rejects_ratio_out_of_range() {
        let err = FsConfig::default().compact_ratio(1.5).validate().unwrap_err();
        assert_eq!(err.field, "compact_ratio");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: FsConfig = toml::from_str(
            r#"
            small_file_cutoff_bytes = 1048576
            compact_interval = "2m"
            folder_metadata = true
            "#,
        )
        .unwrap();
        assert_eq!(config.small_file_cutoff_bytes, 1024 * 1024);
        assert_eq!(config.compact_interval, Duration::from_secs(120));
        assert!(config.folder_metadata);
        assert_eq!(config.max_readers_per_archive, DEFAULT_MAX_READERS_PER_ARCHIVE);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result: Result<FsConfig, _> = toml::from_str("small_cache = 1");
        assert!(result.is_err());
    }
}
