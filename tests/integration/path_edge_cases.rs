use dupindex::pipeline::{Indexer, IndexerConfig};
use dupindex::scanner::{Hasher, HiddenPolicy, WalkerConfig};
use dupindex::store::Store;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn run(root: &Path) -> (dupindex::pipeline::RunReport, Store) {
    Indexer::default()
        .run(root, Store::open_in_memory().unwrap())
        .unwrap()
}

#[test]
fn test_unicode_and_spaces_in_names() {
    let dir = tempdir().unwrap();
    let names = ["résumé final.pdf", "日本語 ファイル.txt", "emoji 🎉.png", "copy (1).pdf"];
    for name in names {
        File::create(dir.path().join(name))
            .unwrap()
            .write_all(name.as_bytes())
            .unwrap();
    }

    let (report, store) = run(dir.path());

    assert_eq!(report.files_processed, 4);
    let stored = store.files().unwrap();
    for name in names {
        assert!(stored.iter().any(|r| r.file_name == name), "{name} not stored");
    }
    let resume = stored.iter().find(|r| r.file_name == "résumé final.pdf").unwrap();
    assert_eq!(resume.file_format, "pdf");
}

#[test]
fn test_uppercase_extension_is_ignored_case_insensitively() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("APP.LOG"), b"log").unwrap();
    fs::write(dir.path().join("Photo.JPG"), b"jpg").unwrap();

    let (report, store) = run(dir.path());

    assert_eq!(report.enqueued_total, 1);
    assert_eq!(store.files().unwrap()[0].file_format, "jpg");
}

#[test]
fn test_extensions_match_on_name_suffix() {
    let dir = tempdir().unwrap();
    // A bare ".log" is still a log file once hidden files are included.
    fs::write(dir.path().join(".log"), b"x").unwrap();
    fs::write(dir.path().join("appendonly.incr.aof"), b"aof").unwrap();
    fs::write(dir.path().join("archive.tar.gz"), b"gz").unwrap();

    let config = IndexerConfig::default()
        .with_walker(WalkerConfig::default().with_hidden_policy(HiddenPolicy::Include));
    let (report, store) = Indexer::new(config)
        .run(dir.path(), Store::open_in_memory().unwrap())
        .unwrap();

    assert_eq!(report.enqueued_total, 1);
    assert_eq!(report.walk.ignored_extension, 2);
    assert_eq!(store.files().unwrap()[0].file_format, "gz");
}

#[test]
fn test_deeply_nested_tree() {
    let dir = tempdir().unwrap();
    let mut deep = dir.path().to_path_buf();
    for i in 0..40 {
        deep = deep.join(format!("level{i}"));
    }
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join("bottom.txt"), b"deep content").unwrap();

    let (report, store) = run(dir.path());

    assert_eq!(report.files_processed, 1);
    let hash = Hasher::new().hash_bytes(b"deep content").to_hex();
    assert!(store.file_by_hash(&hash).unwrap().is_some());
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let outside = tempdir().unwrap();
    fs::write(outside.path().join("secret.txt"), b"outside").unwrap();
    fs::write(dir.path().join("real.txt"), b"inside").unwrap();
    symlink(dir.path().join("real.txt"), dir.path().join("link.txt")).unwrap();
    symlink(outside.path(), dir.path().join("linked_dir")).unwrap();

    let (report, store) = run(dir.path());

    assert_eq!(report.enqueued_total, 1);
    assert_eq!(store.file_count().unwrap(), 1);
    assert!(store.files().unwrap()[0].full_path.ends_with("real.txt"));
}

#[cfg(unix)]
#[test]
fn test_paths_with_newlines_and_quotes() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("line\nbreak.txt"), b"same").unwrap();
    fs::write(dir.path().join("quote\"d.txt"), b"same").unwrap();

    let (report, store) = run(dir.path());

    assert_eq!(report.files_processed, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(store.file_count().unwrap(), 1);
}
