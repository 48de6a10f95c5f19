//! A single open handle onto a ZIP archive.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use zip::ZipArchive;
use zip::result::ZipError;

use super::entry::{ArchiveEntry, OriginPlatform, dos_datetime_to_system_time};
use crate::error::ArchiveError;

/// Central directory file header signature.
const CENTRAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x01\x02";

/// Read-only handle onto one archive file.
///
/// Handles are not shared: an [`ArchivePool`](super::ArchivePool) hands each
/// one to a single caller at a time.
pub struct ArchiveReader {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
    /// Separate descriptor for reading raw central directory bytes.
    raw: File,
}

impl ArchiveReader {
    /// Opens `path` and parses its central directory.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let open_err = |source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_err)?;
        let raw = file.try_clone().map_err(open_err)?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|source| ArchiveError::Zip {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(archive = %path.display(), entries = archive.len(), "Opened archive reader");
        Ok(Self {
            path: path.to_path_buf(),
            archive,
            raw,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the central directory.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Lists every entry without decompressing anything.
    pub fn entries(&mut self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut listed = Vec::with_capacity(self.archive.len());
        let mut header_offsets = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let file = self.archive.by_index_raw(index).map_err(|source| ArchiveError::Zip {
                path: self.path.clone(),
                source,
            })?;
            header_offsets.push(file.central_header_start());
            listed.push(ArchiveEntry {
                name: file.name().to_owned(),
                is_dir: file.is_dir(),
                size: file.size(),
                modified: file.last_modified().and_then(dos_datetime_to_system_time),
                origin: OriginPlatform::Unix,
            });
        }

        for (entry, offset) in listed.iter_mut().zip(header_offsets) {
            entry.origin = self.origin_at(offset);
        }
        Ok(listed)
    }

    /// Reads an entry fully into memory.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|e| entry_error(&self.path, name, e))?;
        let capacity = usize::try_from(file.size()).unwrap_or(0);
        let mut buf = Vec::with_capacity(capacity);
        file.read_to_end(&mut buf).map_err(|source| ArchiveError::Io {
            archive: self.path.clone(),
            entry: name.to_owned(),
            source,
        })?;
        trace!(archive = %self.path.display(), entry = name, bytes = buf.len(), "Buffered entry");
        Ok(buf)
    }

    /// Streams an entry into `writer`, returning the number of bytes copied.
    pub fn copy_entry<W: Write + ?Sized>(&mut self, name: &str, writer: &mut W) -> Result<u64, ArchiveError> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|e| entry_error(&self.path, name, e))?;
        io::copy(&mut file, writer).map_err(|source| ArchiveError::Io {
            archive: self.path.clone(),
            entry: name.to_owned(),
            source,
        })
    }

    /// Decompresses an entry from the start, discards `offset` bytes and
    /// fills `buf` with what follows. Returns the bytes copied, short only at
    /// the end of the entry.
    pub fn read_entry_range(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> Result<usize, ArchiveError> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|e| entry_error(&self.path, name, e))?;
        let io_err = |source| ArchiveError::Io {
            archive: self.path.clone(),
            entry: name.to_owned(),
            source,
        };
        let skipped = io::copy(&mut (&mut file).take(offset), &mut io::sink()).map_err(io_err)?;
        if skipped < offset {
            return Ok(0);
        }
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(io_err(e)),
            }
        }
        trace!(archive = %self.path.display(), entry = name, offset, bytes = filled, "Streamed entry range");
        Ok(filled)
    }

    /// Host byte of the central directory header at `offset`.
    ///
    /// Falls back to Unix when the header cannot be read, which keeps `\` and
    /// `:` as ordinary name characters.
    fn origin_at(&mut self, offset: u64) -> OriginPlatform {
        let mut header = [0u8; 6];
        let read = self
            .raw
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.raw.read_exact(&mut header));
        match read {
            Ok(()) if header[..4] == CENTRAL_HEADER_SIGNATURE => {
                OriginPlatform::from_host_byte(header[5])
            }
            Ok(()) => {
                trace!(archive = %self.path.display(), offset, "No central header at offset");
                OriginPlatform::Unix
            }
            Err(e) => {
                trace!(archive = %self.path.display(), offset, error = %e, "Central header unreadable");
                OriginPlatform::Unix
            }
        }
    }
}

fn entry_error(archive: &Path, name: &str, err: ZipError) -> ArchiveError {
    match err {
        ZipError::FileNotFound => ArchiveError::EntryNotFound {
            archive: archive.to_path_buf(),
            entry: name.to_owned(),
        },
        source => ArchiveError::Zip {
            path: archive.to_path_buf(),
            source,
        },
    }
}

impl Drop for ArchiveReader {
    fn drop(&mut self) {
        debug!(archive = %self.path.display(), "Closed archive reader");
    }
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("path", &self.path)
            .field("entries", &self.archive.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn write_archive(dir: &TempDir, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.path().join("test.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_lists_entries() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(&dir, &[("docs/", b""), ("docs/a.txt", b"hello"), ("b.bin", &[0u8; 64])]);

        let mut reader = ArchiveReader::open(&path).unwrap();
        let entries = reader.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].name, "docs/a.txt");
        assert_eq!(entries[1].size, 5);
        assert_eq!(entries[2].size, 64);
    }

    #[test]
    fn test_read_and_copy_entry() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(&dir, &[("a.txt", b"hello world")]);
        let mut reader = ArchiveReader::open(&path).unwrap();

        assert_eq!(reader.read_entry("a.txt").unwrap(), b"hello world");

        let mut out = Cursor::new(Vec::new());
        assert_eq!(reader.copy_entry("a.txt", &mut out).unwrap(), 11);
        assert_eq!(out.into_inner(), b"hello world");
    }

    #[test]
    fn test_read_entry_range() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(&dir, &[("digits.txt", b"0123456789")]);
        let mut reader = ArchiveReader::open(&path).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(reader.read_entry_range("digits.txt", 3, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"3456");

        let mut buf = [0u8; 16];
        assert_eq!(reader.read_entry_range("digits.txt", 8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(reader.read_entry_range("digits.txt", 10, &mut buf).unwrap(), 0);
        assert_eq!(reader.read_entry_range("digits.txt", 99, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_missing_entry() {
        let dir = TempDir::new().unwrap();
        let path = write_archive(&dir, &[("a.txt", b"x")]);
        let mut reader = ArchiveReader::open(&path).unwrap();
        let err = reader.read_entry("nope.txt").unwrap_err();
        assert!(matches!(err, ArchiveError::EntryNotFound { ref entry, .. } if entry == "nope.txt"));
    }

    #[test]
    fn test_open_rejects_non_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        assert!(matches!(ArchiveReader::open(&path), Err(ArchiveError::Zip { .. })));

        let missing = dir.path().join("missing.zip");
        assert!(matches!(ArchiveReader::open(&missing), Err(ArchiveError::Open { .. })));
    }
}
