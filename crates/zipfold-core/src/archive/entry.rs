//! Archive entry metadata and stored-path handling.

use std::time::SystemTime;

use chrono::NaiveDate;

/// Host system recorded in an entry's "version made by" field.
///
/// The stored path is split differently depending on where the archive was
/// written: Unix tools only ever use `/`, while DOS/Windows tools are known
/// to store `\` and drive-letter colons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginPlatform {
    /// Host byte 3.
    Unix,
    /// Any other host byte (0 = MS-DOS/FAT, 10 = NTFS, 19 = OS X, ...).
    Other(u8),
}

impl OriginPlatform {
    const UNIX_HOST: u8 = 3;

    pub fn from_host_byte(byte: u8) -> Self {
        if byte == Self::UNIX_HOST {
            OriginPlatform::Unix
        } else {
            OriginPlatform::Other(byte)
        }
    }

    fn is_separator(self, c: char) -> bool {
        match self {
            OriginPlatform::Unix => c == '/',
            OriginPlatform::Other(_) => matches!(c, '/' | '\\' | ':'),
        }
    }
}

/// Splits a stored entry name into path components.
///
/// Empty components (leading, trailing or doubled separators) are dropped.
///
/// ```
/// use zipfold_core::archive::{split_entry_path, OriginPlatform};
///
/// assert_eq!(split_entry_path("a/b\\c", OriginPlatform::Unix), vec!["a", "b\\c"]);
/// assert_eq!(split_entry_path("C:\\a/b", OriginPlatform::Other(0)), vec!["C", "a", "b"]);
/// ```
pub fn split_entry_path(name: &str, origin: OriginPlatform) -> Vec<&str> {
    name.split(|c| origin.is_separator(c))
        .filter(|part| !part.is_empty())
        .collect()
}

/// One entry from an archive's central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name exactly as stored; used to open the entry again later.
    pub name: String,
    pub is_dir: bool,
    /// Uncompressed size in bytes.
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub origin: OriginPlatform,
}

impl ArchiveEntry {
    /// Path components of the stored name.
    pub fn components(&self) -> Vec<&str> {
        split_entry_path(&self.name, self.origin)
    }

    /// A name ending in a separator has no file part and denotes a directory.
    pub fn denotes_directory(&self) -> bool {
        self.is_dir || self.name.chars().last().is_some_and(|c| self.origin.is_separator(c))
    }
}

/// Converts an MS-DOS timestamp to `SystemTime`.
///
/// DOS timestamps carry no zone, so they are read as UTC. Field values the
/// calendar rejects (month 0, February 30th) yield `None`.
pub(crate) fn dos_datetime_to_system_time(dt: zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(i32::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()))?
        .and_hms_opt(u32::from(dt.hour()), u32::from(dt.minute()), u32::from(dt.second()))?;
    Some(naive.and_utc().into())
}
