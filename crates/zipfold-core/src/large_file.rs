//! Temp-file backed, memory-mapped archive entries.
//!
//! Entries at or above the small-file cutoff are too big to buffer on the
//! heap. They are extracted once into a temporary file named
//! `zipfold-<random>.zipfold` and served from a read-only map of that file.
//! The file lives exactly as long as the [`LargeFileEntry`]: dropping the
//! entry unmaps it and then deletes the file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::{BoxError, VfsError};

const TEMP_PREFIX: &str = "zipfold-";
const TEMP_SUFFIX: &str = ".zipfold";

/// A memory-mapped copy of one archive entry.
pub struct LargeFileEntry {
    /// `None` for empty entries, which cannot be mapped.
    map: Option<Mmap>,
    len: u64,
    path: Option<TempPath>,
}

impl LargeFileEntry {
    /// Creates a temp file in `dir`, lets `fill` write the content and maps it.
    ///
    /// `dir` is created if it does not exist. If anything fails the temp file
    /// is removed again.
    pub fn create_with<F, E>(dir: &Path, fill: F) -> Result<Self, BoxError>
    where
        F: FnOnce(&mut dyn Write) -> Result<u64, E>,
        E: Into<BoxError>,
    {
        fs::create_dir_all(dir).map_err(|e| VfsError::io(dir, e))?;
        let named = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| VfsError::io(dir, e))?;
        let (file, path) = named.into_parts();

        let mut writer = BufWriter::new(file);
        let written = fill(&mut writer).map_err(|e| -> BoxError { e.into() })?;
        let file = writer
            .into_inner()
            .map_err(|e| VfsError::io(&*path, e.into_error()))?;

        let map = if written == 0 { None } else { Some(map_file(&file, &path)?) };
        debug!(path = %path.display(), bytes = written, "Mapped large entry");
        Ok(Self {
            map,
            len: written,
            path: Some(path),
        })
    }

    /// Copies bytes starting at `offset` into `buf`.
    ///
    /// Returns 0 at or past the end; short reads are silent.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let Some(map) = &self.map else {
            return 0;
        };
        copy_range(map, offset, buf)
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the backing temp file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[allow(unsafe_code)]
fn map_file(file: &File, path: &Path) -> Result<Mmap, VfsError> {
    // SAFETY: the file was created by us with a random name, is never written
    // after this point and is only deleted once the map has been dropped.
    unsafe { Mmap::map(file) }.map_err(|e| VfsError::io(path, e))
}

/// Copies `min(buf.len(), data.len() - offset)` bytes; 0 if `offset` is past the end.
pub(crate) fn copy_range(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= data.len() {
        return 0;
    }
    let count = buf.len().min(data.len() - start);
    buf[..count].copy_from_slice(&data[start..start + count]);
    count
}

impl Drop for LargeFileEntry {
    fn drop(&mut self) {
        // Unmap before deleting; Windows refuses to delete mapped files.
        drop(self.map.take());
        if let Some(path) = self.path.take() {
            let removed = path.to_path_buf();
            match path.close() {
                Ok(()) => debug!(path = %removed.display(), "Removed large entry temp file"),
                Err(e) => warn!(path = %removed.display(), error = %e, "Failed to remove large entry temp file"),
            }
        }
    }
}

impl std::fmt::Debug for LargeFileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeFileEntry")
            .field("len", &self.len)
            .field("path", &self.path.as_deref())
            .finish_non_exhaustive()
    }
}
