//! ZIP archive access: entry metadata, readers and bounded reader pools.

mod entry;
mod pool;
mod reader;

pub use self::entry::{ArchiveEntry, OriginPlatform, split_entry_path};
pub use self::pool::{ArchivePool, PooledReader};
pub use self::reader::ArchiveReader;

/// File extensions recognized as archives, compared case-insensitively.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

/// True if `path` has a recognized archive extension.
pub fn is_archive_path(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ARCHIVE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_archive_extension_detection() {
        assert!(is_archive_path(Path::new("/data/photos.zip")));
        assert!(is_archive_path(Path::new("BACKUP.ZIP")));
        assert!(!is_archive_path(Path::new("notes.txt")));
        assert!(!is_archive_path(Path::new("zip")));
    }
}
