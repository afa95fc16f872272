use filetime::{set_file_mtime, FileTime};
use rdupes::cache::{FileMeta, HashCache, HashCount, LoadStatus, Lookup, SaveStatus};
use rdupes::duplicates::{DuplicateFinder, FinderConfig};
use rdupes::scanner::{FileRecord, HashAlgorithm};
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

fn record_for(path: &std::path::Path) -> FileRecord {
    let meta = fs::metadata(path).unwrap();
    FileRecord::from_metadata(path, &meta, 0)
}

#[test]
fn test_round_trip_through_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hashdb.txt");

    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    for i in 0..50u64 {
        let meta = FileMeta {
            size: i * 1000,
            mtime: 1_600_000_000 + i as i64,
            inode: 10_000 + i,
        };
        let full = (i % 2 == 0).then_some(i.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        cache.upsert(&format!("/data/file,{i}"), meta, Some(i + 1), full);
    }
    assert_eq!(cache.save_path(&db).unwrap(), SaveStatus::Written(50));

    let mut loaded = HashCache::new(HashAlgorithm::Xxh64);
    assert_eq!(loaded.load_path(&db).unwrap(), LoadStatus::Loaded(50));
    assert!(!loaded.is_dirty());

    let mut before: Vec<_> = cache.entries().cloned().collect();
    let mut after: Vec<_> = loaded.entries().cloned().collect();
    before.sort_by(|a, b| a.path.cmp(&b.path));
    after.sort_by(|a, b| a.path.cmp(&b.path));
    assert_eq!(before, after);
    assert!(after
        .iter()
        .any(|e| e.hash_count == HashCount::Partial));
}

#[test]
fn test_stale_entry_is_dropped_on_save() {
    let dir = TempDir::new().unwrap();
    let x = dir.path().join("x");
    let y = dir.path().join("y");
    fs::write(&x, b"content of x").unwrap();
    fs::write(&y, b"content of y").unwrap();
    set_file_mtime(&x, FileTime::from_unix_time(1_000_000, 0)).unwrap();

    let x_path = x.to_str().unwrap().to_string();
    let y_path = y.to_str().unwrap().to_string();
    let old_x = record_for(&x).cache_meta().unwrap();
    let y_meta = record_for(&y).cache_meta().unwrap();

    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    cache.upsert(&x_path, old_x, Some(1), Some(2));
    cache.upsert(&y_path, y_meta, Some(3), None);
    let mut buf = Vec::new();
    cache.save(&mut buf).unwrap();

    // The file changes after the database was written
    set_file_mtime(&x, FileTime::from_unix_time(2_000_000, 0)).unwrap();
    let current_x = record_for(&x).cache_meta().unwrap();
    assert_ne!(current_x, old_x);

    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    cache.load(Cursor::new(buf)).unwrap();
    assert!(!cache.is_dirty());

    assert_eq!(cache.lookup_or_invalidate(&x_path, &current_x), Lookup::Stale);
    assert!(cache.is_dirty());
    assert_eq!(cache.lookup_or_invalidate(&x_path, &current_x), Lookup::Stale);
    assert_eq!(
        cache.lookup_or_invalidate(&y_path, &y_meta),
        Lookup::Hit {
            partial: 3,
            full: None
        }
    );

    let mut out = Vec::new();
    assert_eq!(cache.save(&mut out).unwrap(), SaveStatus::Written(1));
    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains(&x_path));
    assert!(text.contains(&y_path));

    // Upserting again brings it back
    cache.upsert(&x_path, current_x, Some(9), None);
    let mut out = Vec::new();
    assert_eq!(cache.save(&mut out).unwrap(), SaveStatus::Written(2));
    assert!(String::from_utf8(out).unwrap().contains(&x_path));
}

#[test]
fn test_clean_cache_is_not_rewritten() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hashdb.txt");
    fs::write(&db, "jdupes hashdb:1,0,00000000\n").unwrap();

    let mut cache = HashCache::open(&db, HashAlgorithm::Xxh64);
    assert!(cache.is_empty());
    assert_eq!(cache.save_path(&db).unwrap(), SaveStatus::Clean);
    assert_eq!(
        fs::read_to_string(&db).unwrap(),
        "jdupes hashdb:1,0,00000000\n"
    );
}

#[test]
fn test_second_run_uses_hash_database() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    let big = vec![0xc3u8; 10_000];
    for name in ["one", "two", "three"] {
        fs::write(data.join(name), &big).unwrap();
    }
    let db = dir.path().join("hashdb.txt");

    let run = || {
        let mut finder = DuplicateFinder::new(FinderConfig::default().with_hash_db(&db));
        for name in ["one", "two", "three"] {
            finder.push(record_for(&data.join(name))).unwrap();
        }
        finder.finish().unwrap()
    };

    let first = run();
    assert_eq!(first.groups.len(), 1);
    assert_eq!(first.groups[0].len(), 3);
    assert!(first.summary.match_stats.full_hashes > 0);
    assert_eq!(first.summary.cache_entries_saved, Some(3));

    let second = run();
    assert_eq!(second.groups.len(), 1);
    assert_eq!(second.groups[0].len(), 3);
    assert_eq!(second.summary.match_stats.partial_hashes, 0);
    assert_eq!(second.summary.match_stats.full_hashes, 0);
    assert_eq!(second.summary.match_stats.cache_hits, 3);
    assert_eq!(second.summary.cache_entries_saved, None);
}

#[test]
fn test_algorithm_change_ignores_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("hashdb.txt");

    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    let meta = FileMeta {
        size: 5,
        mtime: 5,
        inode: 5,
    };
    cache.upsert("/a", meta, Some(1), Some(1));
    cache.save_path(&db).unwrap();

    let mut other = HashCache::new(HashAlgorithm::Xxh3);
    assert_eq!(
        other.load_path(&db).unwrap(),
        LoadStatus::AlgorithmMismatch { found: 0 }
    );
    assert!(other.is_empty());
    assert_eq!(other.lookup_or_invalidate("/a", &meta), Lookup::Absent);
}
