use dupindex::audit::keys;
use dupindex::pipeline::{Indexer, IndexerConfig, ScanMode};
use dupindex::scanner::{HashAlgorithm, Hasher, Walker, WalkerConfig};
use dupindex::store::Store;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write(dir: &Path, rel: &str, content: &[u8]) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().write_all(content).unwrap();
}

fn index(root: &Path, config: IndexerConfig) -> (dupindex::pipeline::RunReport, Store) {
    Indexer::new(config)
        .run(root, Store::open_in_memory().unwrap())
        .unwrap()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();

    let (report, store) = index(dir.path(), IndexerConfig::default());

    assert_eq!(report.enqueued_total, 0);
    assert_eq!(report.files_processed, 0);
    assert_eq!(store.file_count().unwrap(), 0);
    assert_eq!(store.audit_value(keys::MISSING_FILES).unwrap().as_deref(), Some("0"));
}

#[test]
fn test_scan_two_copies_and_one_unique() {
    let dir = tempdir().unwrap();
    write(dir.path(), "A", b"hello");
    write(dir.path(), "B", b"hello");
    write(dir.path(), "C", b"world");

    let (report, store) = index(dir.path(), IndexerConfig::default());

    assert_eq!(store.file_count().unwrap(), 2);
    let hello = Hasher::new().hash_bytes(b"hello").to_hex();
    let world = Hasher::new().hash_bytes(b"world").to_hex();
    assert_eq!(store.file_by_hash(&hello).unwrap().unwrap().update_count, 1);
    assert_eq!(store.file_by_hash(&world).unwrap().unwrap().update_count, 0);

    assert_eq!(report.enqueued_total, 3);
    assert_eq!(report.files_processed, 3);
    assert_eq!(report.difference, 0);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.missing_files, 0);
    assert_eq!(store.audit_value(keys::FILES_SKIPPED).unwrap().as_deref(), Some("1"));
    assert_eq!(store.audit_value(keys::ENQUEUED_TOTAL).unwrap().as_deref(), Some("3"));
}

#[test]
fn test_ignored_directory_is_never_enqueued() {
    let dir = tempdir().unwrap();
    write(dir.path(), "keep.txt", b"keep");
    write(dir.path(), ".git/config", b"[core]");
    write(dir.path(), "node_modules/pkg/index.js", b"module.exports = 1");

    let (report, store) = index(dir.path(), IndexerConfig::default());

    assert_eq!(report.enqueued_total, 1);
    assert_eq!(store.file_count().unwrap(), 1);
    let stored = store.files().unwrap();
    assert!(stored[0].full_path.ends_with("keep.txt"));
}

#[test]
fn test_filtered_files_are_not_stored() {
    let dir = tempdir().unwrap();
    write(dir.path(), "data.bin", b"payload");
    write(dir.path(), "empty.txt", b"");
    write(dir.path(), "server.log", b"log line");
    write(dir.path(), "dump.incr.aof", b"aof");
    write(dir.path(), ".hidden", b"secret");

    let (report, store) = index(dir.path(), IndexerConfig::default());

    assert_eq!(report.enqueued_total, 1);
    assert_eq!(report.walk.empty, 1);
    assert_eq!(report.walk.ignored_extension, 2);
    assert_eq!(report.walk.hidden, 1);
    assert_eq!(store.file_count().unwrap(), 1);
}

#[test]
fn test_nested_duplicates_across_directories() {
    let dir = tempdir().unwrap();
    for i in 0..5 {
        write(dir.path(), &format!("d{i}/copy.jpg"), b"same picture bytes");
    }
    write(dir.path(), "other.jpg", b"different picture");

    let (report, store) = index(dir.path(), IndexerConfig::default().with_batch_size(2));

    assert_eq!(report.files_processed, 6);
    assert_eq!(report.files_skipped, 4);
    assert_eq!(store.file_count().unwrap(), 2);
    let hash = Hasher::new().hash_bytes(b"same picture bytes").to_hex();
    let record = store.file_by_hash(&hash).unwrap().unwrap();
    assert_eq!(record.update_count, 4);
    assert_eq!(record.file_format, "jpg");
}

#[test]
fn test_single_and_concurrent_modes_agree() {
    let dir = tempdir().unwrap();
    for i in 0..30 {
        write(dir.path(), &format!("f{i:02}.txt"), format!("content {}", i % 10).as_bytes());
    }

    let (single, single_store) = index(dir.path(), IndexerConfig::default().with_mode(ScanMode::Single));
    let (concurrent, concurrent_store) =
        index(dir.path(), IndexerConfig::default().with_workers(8).with_batch_size(4));

    assert_eq!(single.files_processed, concurrent.files_processed);
    assert_eq!(single.files_skipped, 20);
    assert_eq!(concurrent.files_skipped, 20);
    assert_eq!(single_store.file_count().unwrap(), 10);
    assert_eq!(concurrent_store.file_count().unwrap(), 10);
}

#[test]
fn test_single_mode_keeps_first_path_in_walk_order() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/first.txt", b"dup");
    write(dir.path(), "b/second.txt", b"dup");
    write(dir.path(), "c/third.txt", b"dup");

    let (_, store) = index(dir.path(), IndexerConfig::default().with_mode(ScanMode::Single));

    let stored = store.files().unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].full_path.ends_with("first.txt"));
    assert_eq!(stored[0].update_count, 2);
}

#[test]
fn test_blake3_fingerprints_are_stored() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"hello");

    let (report, store) = index(
        dir.path(),
        IndexerConfig::default().with_hash_algorithm(HashAlgorithm::Blake3),
    );

    assert_eq!(report.hash_algorithm, HashAlgorithm::Blake3);
    let expected = blake3::hash(b"hello").to_hex().to_string();
    assert!(store.file_by_hash(&expected).unwrap().is_some());
    assert_eq!(store.audit_value(keys::HASH_ALGORITHM).unwrap().as_deref(), Some("blake3"));
}

#[test]
fn test_walker_paths_match_enqueued_listing() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x/1.txt", b"1");
    write(dir.path(), "x/2.txt", b"2");
    write(dir.path(), "y/3.txt", b"3");

    let walked: Vec<_> = Walker::new(dir.path(), WalkerConfig::default()).walk().collect();
    let data = dir.path().join("listings");
    let config = IndexerConfig::default().with_listing_dir(data.clone());
    let (report, _) = index(dir.path(), config);

    assert_eq!(report.enqueued_total as usize, walked.len());
    let listing = fs::read_to_string(data.join("enqueued.txt")).unwrap();
    assert_eq!(listing.lines().count(), walked.len());
}
