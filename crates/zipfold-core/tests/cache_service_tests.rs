//! Cache behaviour observed through the façade: eviction, temp-file
//! lifetime, compaction and statistics.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{ArchiveBuilder, large_temp_files, sized_content};
use tempfile::TempDir;
use zipfold_core::{ArchiveFs, CacheStatsSnapshot, FsConfig};

fn stats<'a>(snapshots: &'a [CacheStatsSnapshot], name: &str) -> &'a CacheStatsSnapshot {
    snapshots.iter().find(|s| s.name == name).unwrap()
}

fn read_all(fs: &ArchiveFs, path: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = fs.read_file(path, &mut buf, out.len() as u64).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// Two 200-byte large entries and a large-file cache that holds only one.
fn two_large_entries() -> (TempDir, TempDir, ArchiveFs) {
    let dir = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    ArchiveBuilder::new()
        .file("a.bin", sized_content(200))
        .file("b.bin", sized_content(200))
        .write_to(&dir.path().join("big.zip"));
    let config = FsConfig::default()
        .small_file_cache_bytes(4096)
        .small_file_cutoff_bytes(64)
        .large_file_cache_bytes(300)
        .with_large_file_dir(cache_dir.path());
    let fs = ArchiveFs::new(dir.path(), config).unwrap();
    (dir, cache_dir, fs)
}

#[test]
fn test_evicted_large_entry_deletes_temp_file() {
    common::init_tracing();
    let (_dir, cache_dir, fs) = two_large_entries();

    assert_eq!(read_all(&fs, "/big/a.bin"), sized_content(200));
    let first = large_temp_files(cache_dir.path());
    assert_eq!(first.len(), 1);

    assert_eq!(read_all(&fs, "/big/b.bin"), sized_content(200));
    let second = large_temp_files(cache_dir.path());
    assert_eq!(second.len(), 1);
    assert!(!first[0].exists());
    assert_ne!(first, second);

    let snapshots = fs.cache_stats();
    assert_eq!(stats(&snapshots, "large-files").evictions, 1);
}

#[test]
fn test_dropping_fs_removes_temp_files() {
    let (_dir, cache_dir, fs) = two_large_entries();
    read_all(&fs, "/big/a.bin");
    assert_eq!(large_temp_files(cache_dir.path()).len(), 1);
    drop(fs);
    assert!(large_temp_files(cache_dir.path()).is_empty());
}

#[test]
fn test_compact_empties_file_caches() {
    let (_dir, cache_dir, fs) = two_large_entries();
    ArchiveBuilder::new()
        .file("small.txt", b"tiny")
        .write_to(&fs.root_path().join("small.zip"));

    read_all(&fs, "/big/a.bin");
    read_all(&fs, "/small/small.txt");

    let evicted = fs.compact().unwrap();
    assert_eq!(evicted, 2);
    assert!(large_temp_files(cache_dir.path()).is_empty());

    let snapshots = fs.cache_stats();
    assert_eq!(stats(&snapshots, "small-files").entries, 0);
    assert_eq!(stats(&snapshots, "large-files").size, 0);
    // Shapes and pools are left alone.
    assert_eq!(stats(&snapshots, "shapes").entries, 2);
}

#[test]
fn test_repeated_reads_hit_the_cache() {
    let dir = TempDir::new().unwrap();
    ArchiveBuilder::new()
        .file("hello.txt", b"hello world")
        .write_to(&dir.path().join("greet.zip"));
    let fs = ArchiveFs::new(dir.path(), FsConfig::default()).unwrap();

    for _ in 0..5 {
        assert_eq!(read_all(&fs, "/greet/hello.txt"), b"hello world");
    }
    let snapshots = fs.cache_stats();
    let small = stats(&snapshots, "small-files");
    assert_eq!(small.misses, 1);
    assert!(small.hits >= 4);
    assert_eq!(small.size, 11);
    assert_eq!(stats(&snapshots, "archive-pools").entries, 1);
}

#[test]
fn test_shape_rebuilt_after_eviction() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    ArchiveBuilder::new()
        .file("one/a.txt", b"a")
        .file("one/b.txt", b"b")
        .write_to(&dir.path().join("first.zip"));
    ArchiveBuilder::new()
        .file("x.txt", b"x")
        .file("y.txt", b"y")
        .write_to(&dir.path().join("second.zip"));
    // Room for one two-entry listing at a time.
    let fs = ArchiveFs::new(dir.path(), FsConfig::default().shape_cache_entries(3)).unwrap();

    let before = fs.lookup("/first/one/a.txt").unwrap();
    fs.list_children("/second").unwrap();
    let after = fs.lookup("/first/one/a.txt").unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(stats(&fs.cache_stats(), "shapes").evictions >= 1);

    // Nodes handed out before the rebuild keep working.
    let mut buf = [0u8; 4];
    assert_eq!(fs.read_file("/first/one/a.txt", &mut buf, 0).unwrap(), 1);
    assert_eq!(before.info().size, 1);
}

#[test]
fn test_oversized_listing_is_built_uncached() {
    let dir = TempDir::new().unwrap();
    ArchiveBuilder::new()
        .file("a", b"1")
        .file("b", b"2")
        .file("c", b"3")
        .write_to(&dir.path().join("wide.zip"));
    let fs = ArchiveFs::new(dir.path(), FsConfig::default().shape_cache_entries(2)).unwrap();

    assert_eq!(fs.list_children("/wide").unwrap().len(), 3);
    assert_eq!(stats(&fs.cache_stats(), "shapes").entries, 0);
}

#[test]
fn test_background_compactor_trims_caches() {
    let dir = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    ArchiveBuilder::new()
        .file("a.bin", sized_content(200))
        .write_to(&dir.path().join("big.zip"));
    let config = FsConfig::default()
        .small_file_cache_bytes(4096)
        .small_file_cutoff_bytes(64)
        .with_large_file_dir(cache_dir.path())
        .compact_interval(Duration::from_millis(20));
    let fs = ArchiveFs::new(dir.path(), config).unwrap();

    read_all(&fs, "/big/a.bin");
    assert_eq!(large_temp_files(cache_dir.path()).len(), 1);

    assert!(fs.start_compactor().unwrap());
    let deadline = Instant::now() + Duration::from_secs(5);
    while !large_temp_files(cache_dir.path()).is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(large_temp_files(cache_dir.path()).is_empty());
}

#[test]
fn test_entry_larger_than_large_cache_is_streamed() {
    let (dir, cache_dir, fs) = two_large_entries();
    drop(fs);
    let content = sized_content(500);
    ArchiveBuilder::new()
        .file("huge.bin", &content)
        .write_to(&dir.path().join("huge.zip"));
    let config = FsConfig::default()
        .small_file_cache_bytes(4096)
        .small_file_cutoff_bytes(64)
        .large_file_cache_bytes(300)
        .with_large_file_dir(cache_dir.path());
    let fs = ArchiveFs::new(dir.path(), config).unwrap();

    assert_eq!(read_all(&fs, "/huge/huge.bin"), content);
    let mut buf = [0u8; 10];
    assert_eq!(fs.read_file("/huge/huge.bin", &mut buf, 495).unwrap(), 5);
    assert_eq!(&buf[..5], &content[495..]);

    assert!(large_temp_files(cache_dir.path()).is_empty());
    let snapshots = fs.cache_stats();
    let large = stats(&snapshots, "large-files");
    assert_eq!(large.entries, 0);
    assert_eq!(large.rejected, 0);
}
