//! Shared fixtures: ZIP archives written into temp directories.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Routes library logs to the test harness; `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Central directory file header signature.
const CENTRAL_HEADER_SIG: &[u8; 4] = b"PK\x01\x02";

/// Host byte for MS-DOS / FAT in "version made by".
pub const DOS_HOST: u8 = 0;

enum Item {
    File(String, Vec<u8>),
    Dir(String),
}

/// Builds a ZIP archive entry by entry.
///
/// Entries are stored uncompressed, so fixture content never hides a header
/// signature inside deflated bytes.
#[derive(Default)]
pub struct ArchiveBuilder {
    items: Vec<Item>,
    host: Option<u8>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.items.push(Item::File(name.to_owned(), content.as_ref().to_vec()));
        self
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.items.push(Item::Dir(name.to_owned()));
        self
    }

    /// Rewrites every entry's origin host byte after writing.
    pub fn host(mut self, host: u8) -> Self {
        self.host = Some(host);
        self
    }

    pub fn write_to(self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for item in &self.items {
            match item {
                Item::File(name, content) => {
                    writer.start_file(name.as_str(), options).unwrap();
                    writer.write_all(content).unwrap();
                }
                Item::Dir(name) => writer.add_directory(name.as_str(), options).unwrap(),
            }
        }
        writer.finish().unwrap();

        if let Some(host) = self.host {
            set_host_byte(path, host);
        }
        path.to_path_buf()
    }
}

/// Patches the high byte of "version made by" in every central header.
pub fn set_host_byte(path: &Path, host: u8) {
    let mut bytes = fs::read(path).unwrap();
    let mut patched = 0;
    let mut pos = 0;
    while pos + 6 <= bytes.len() {
        if &bytes[pos..pos + 4] == CENTRAL_HEADER_SIG {
            bytes[pos + 5] = host;
            patched += 1;
            pos += 46;
        } else {
            pos += 1;
        }
    }
    assert!(patched > 0, "no central headers in {}", path.display());
    fs::write(path, bytes).unwrap();
}

/// Deterministic content of exactly `size` bytes.
pub fn sized_content(size: usize) -> Vec<u8> {
    let pattern = b"0123456789abcdef";
    (0..size).map(|i| pattern[i % pattern.len()]).collect()
}

/// Temp files for large entries currently in `dir`.
pub fn large_temp_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    read.filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("zipfold-") && n.ends_with(".zipfold"))
        })
        .collect()
}

/// A host tree with one directory, one archive and one ignored plain file:
///
/// ```text
/// root/
///   music/
///     live.zip      -> set/01.txt
///   docs.zip        -> readme.txt (10 bytes), guide/intro.md, empty/
///   notes.txt
/// ```
pub fn sample_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("music")).unwrap();
    ArchiveBuilder::new()
        .file("set/01.txt", b"first track")
        .write_to(&root.join("music").join("live.zip"));
    ArchiveBuilder::new()
        .file("readme.txt", b"0123456789")
        .file("guide/intro.md", b"# Intro\n")
        .dir("empty/")
        .write_to(&root.join("docs.zip"));
    fs::write(root.join("notes.txt"), b"not an archive").unwrap();
    dir
}
