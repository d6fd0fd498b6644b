use dupindex::audit::{keys, ENQUEUED_LISTING, MISSING_LISTING, PROCESSED_LISTING};
use dupindex::pipeline::{Indexer, IndexerConfig, ScanMode};
use dupindex::progress::ProgressCallback;
use dupindex::store::Store;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

/// Deletes a file right after the walker enqueues it, before any worker
/// can fingerprint it.
struct VanishOnEnqueue {
    at: usize,
    victim: PathBuf,
}

impl ProgressCallback for VanishOnEnqueue {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}
    fn on_enqueued(&self, enqueued: usize) {
        if enqueued == self.at {
            fs::remove_file(&self.victim).unwrap();
        }
    }
    fn on_progress(&self, _current: usize, _path: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

fn populate(dir: &Path) {
    fs::write(dir.join("a.txt"), b"alpha").unwrap();
    fs::write(dir.join("b.txt"), b"bravo").unwrap();
    fs::write(dir.join("c.txt"), b"alpha").unwrap();
}

#[test]
fn test_vanished_file_is_reported_missing() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir(&root).unwrap();
    populate(&root);
    let data = dir.path().join("data");

    let callback = Arc::new(VanishOnEnqueue {
        at: 1,
        victim: root.join("a.txt"),
    });
    let config = IndexerConfig::default()
        .with_mode(ScanMode::Single)
        .with_listing_dir(data.clone())
        .with_progress_callback(callback);

    let (report, store) = Indexer::new(config)
        .run(&root, Store::open_in_memory().unwrap())
        .unwrap();

    assert_eq!(report.enqueued_total, 3);
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.missing_files, 1);
    assert_eq!(report.difference, 1);
    assert_eq!(report.files_failed, 1);
    assert_eq!(report.enqueued_total, report.files_processed + report.missing_files);
    assert!(report.missing_paths[0].ends_with("a.txt"));

    // c.txt now holds the only copy of "alpha"
    assert_eq!(store.file_count().unwrap(), 2);
    assert_eq!(report.files_skipped, 0);

    assert_eq!(store.audit_value(keys::MISSING_FILES).unwrap().as_deref(), Some("1"));
    assert_eq!(store.audit_value(keys::DIFFERENCE).unwrap().as_deref(), Some("1"));

    let missing = fs::read_to_string(data.join(MISSING_LISTING)).unwrap();
    assert_eq!(missing.lines().count(), 1);
    assert!(missing.ends_with("a.txt"));
    let processed = fs::read_to_string(data.join(PROCESSED_LISTING)).unwrap();
    assert_eq!(processed.lines().count(), 2);
}

#[test]
fn test_listings_for_clean_run() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir(&root).unwrap();
    populate(&root);
    let data = dir.path().join("data");

    let config = IndexerConfig::default().with_listing_dir(data.clone());
    let (report, _) = Indexer::new(config)
        .run(&root, Store::open_in_memory().unwrap())
        .unwrap();

    let enqueued = fs::read_to_string(data.join(ENQUEUED_LISTING)).unwrap();
    let processed = fs::read_to_string(data.join(PROCESSED_LISTING)).unwrap();
    let missing = fs::read_to_string(data.join(MISSING_LISTING)).unwrap();

    let lines: Vec<&str> = enqueued.lines().collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    assert_eq!(lines, sorted);
    assert_eq!(lines.len(), 3);
    assert_eq!(enqueued, processed);
    assert!(missing.is_empty());
    assert_eq!(report.missing_files, 0);
    assert_eq!(report.audit_failures, 0);
}

#[test]
fn test_every_audit_key_is_written() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let (report, store) = Indexer::default()
        .run(dir.path(), Store::open_in_memory().unwrap())
        .unwrap();

    for key in [
        keys::SCAN_FOLDER,
        keys::MODE,
        keys::BATCH_SIZE,
        keys::HASH_ALGORITHM,
        keys::START_TIME,
        keys::END_TIME,
        keys::ELAPSED_TIME,
        keys::ENQUEUED_TOTAL,
        keys::FILES_PROCESSED,
        keys::DIFFERENCE,
        keys::FILES_SKIPPED,
        keys::MISSING_FILES,
        keys::RECORDS_STORED,
        keys::RECORDS_FAILED,
    ] {
        assert!(store.audit_value(key).unwrap().is_some(), "missing audit key {key}");
    }

    assert_eq!(
        store.audit_value(keys::SCAN_FOLDER).unwrap(),
        Some(report.scan_root.display().to_string())
    );
    assert_eq!(
        store.audit_value(keys::MODE).unwrap().as_deref(),
        Some("concurrent, 8 workers")
    );
    let elapsed = store.audit_value(keys::ELAPSED_TIME).unwrap().unwrap();
    assert_eq!(elapsed.split('.').nth(1).map(str::len), Some(2));
    let start = store.audit_value(keys::START_TIME).unwrap().unwrap();
    assert!(start.ends_with('Z'));
}

#[test]
fn test_unwritable_listing_dir_does_not_fail_run() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir(&root).unwrap();
    populate(&root);
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let config = IndexerConfig::default().with_listing_dir(blocker.join("data"));
    let (report, store) = Indexer::new(config)
        .run(&root, Store::open_in_memory().unwrap())
        .unwrap();

    assert_eq!(report.audit_failures, 3);
    assert_eq!(store.file_count().unwrap(), 2);
    assert!(store.audit_value(keys::FILES_PROCESSED).unwrap().is_some());
}
