use dupindex::pipeline::{Dispatcher, Indexer, IndexerConfig, ScanMode};
use dupindex::store::Store;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn populate(dir: &Path, n: usize) {
    for i in 0..n {
        fs::write(dir.join(format!("f{i:03}.dat")), format!("payload {i}")).unwrap();
    }
}

#[test]
fn test_three_files_batch_of_two_flushes_twice() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 3);

    let config = IndexerConfig::default().with_batch_size(2);
    let (report, store) = Indexer::new(config)
        .run(dir.path(), Store::open_in_memory().unwrap())
        .unwrap();

    assert_eq!(report.flush.flush_sizes, vec![2, 1]);
    assert_eq!(store.file_count().unwrap(), 3);
}

#[test]
fn test_exact_multiple_of_batch_size_has_no_empty_flush() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 6);

    let config = IndexerConfig::default().with_batch_size(3);
    let (report, _) = Indexer::new(config)
        .run(dir.path(), Store::open_in_memory().unwrap())
        .unwrap();

    assert_eq!(report.flush.flush_sizes, vec![3, 3]);
}

#[test]
fn test_in_flight_bounded_by_workers() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 200);

    for workers in [1, 2, 4] {
        let config = IndexerConfig::default().with_workers(workers).with_batch_size(7);
        let (report, _) = Indexer::new(config)
            .run(dir.path(), Store::open_in_memory().unwrap())
            .unwrap();

        assert!(report.peak_in_flight <= workers, "{} > {}", report.peak_in_flight, workers);
        assert_eq!(report.files_processed, 200);
    }
}

#[test]
fn test_flushes_never_overlap() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 150);

    let config = IndexerConfig::default().with_workers(8).with_batch_size(1);
    let (report, store) = Indexer::new(config)
        .run(dir.path(), Store::open_in_memory().unwrap())
        .unwrap();

    assert_eq!(report.flush.peak_concurrent_flushes, 1);
    assert_eq!(report.flush.flushes, 150);
    assert_eq!(store.file_count().unwrap(), 150);
}

#[test]
fn test_single_mode_runs_one_at_a_time() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 40);

    let config = IndexerConfig::default().with_mode(ScanMode::Single).with_workers(8);
    let (report, _) = Indexer::new(config)
        .run(dir.path(), Store::open_in_memory().unwrap())
        .unwrap();

    assert_eq!(report.workers, 1);
    assert_eq!(report.peak_in_flight, 1);
}

#[test]
fn test_dispatcher_observed_concurrency_with_slow_tasks() {
    let active = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);
    let paths: Vec<PathBuf> = (0..64).map(|i| PathBuf::from(format!("/v/{i}"))).collect();

    let stats = Dispatcher::new(4)
        .with_queue_capacity(1)
        .run(paths, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(stats.dispatched, 64);
    assert_eq!(stats.succeeded, 64);
}
