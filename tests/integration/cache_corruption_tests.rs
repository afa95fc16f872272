use rdupes::cache::{CacheError, FileMeta, HashCache, LoadStatus, Lookup};
use rdupes::scanner::path_utils::path_key;
use rdupes::scanner::HashAlgorithm;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

const GOOD_LINE: &str =
    "2,00000000000000aa,00000000000000bb,00000010,00000020,0000000000000030,/good/path";

fn meta() -> FileMeta {
    FileMeta {
        size: 0x20,
        mtime: 0x10,
        inode: 0x30,
    }
}

#[test]
fn test_valid_line_loads() {
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    let input = format!("jdupes hashdb:1,0,5f000000\n{GOOD_LINE}\n");
    assert_eq!(
        cache.load(Cursor::new(input)).unwrap(),
        LoadStatus::Loaded(1)
    );
    assert_eq!(
        cache.lookup_or_invalidate("/good/path", &meta()),
        Lookup::Hit {
            partial: 0xaa,
            full: Some(0xbb)
        }
    );
}

#[test]
fn test_garbage_header() {
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    let err = cache
        .load(Cursor::new("not a hash database\n"))
        .unwrap_err();
    assert!(matches!(err, CacheError::Header(_)));
    assert!(cache.is_empty());
}

#[test]
fn test_empty_file_is_bad_header() {
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    let err = cache.load(Cursor::new("")).unwrap_err();
    assert!(matches!(err, CacheError::Header(_)));
}

#[test]
fn test_unsupported_version() {
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    let input = format!("jdupes hashdb:2,0,5f000000\n{GOOD_LINE}\n");
    let err = cache.load(Cursor::new(input)).unwrap_err();
    assert!(matches!(err, CacheError::Version(2)));
    assert!(cache.is_empty());
}

#[test]
fn test_malformed_line_clears_everything() {
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    let input = format!("jdupes hashdb:1,0,5f000000\n{GOOD_LINE}\n3,zz,short\n");
    let err = cache.load(Cursor::new(input)).unwrap_err();
    match err {
        CacheError::Line { line, content } => {
            assert_eq!(line, 3);
            assert_eq!(content, "3,zz,short");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(cache.is_empty());
    assert_eq!(
        cache.lookup_or_invalidate("/good/path", &meta()),
        Lookup::Absent
    );
}

#[test]
fn test_hash_count_out_of_range() {
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    let bad = GOOD_LINE.replacen('2', "3", 1);
    let input = format!("jdupes hashdb:1,0,5f000000\n{bad}\n");
    assert!(matches!(
        cache.load(Cursor::new(input)),
        Err(CacheError::Line { line: 2, .. })
    ));
}

#[test]
fn test_open_corrupted_file_continues_empty() {
    let temp = NamedTempFile::new().unwrap();
    fs::write(temp.path(), b"\x00\x01garbage").unwrap();

    let mut cache = HashCache::open(temp.path(), HashAlgorithm::Xxh64);
    assert!(cache.is_empty());
    assert!(!cache.is_dirty());

    // The cache still works after the failed load
    assert!(cache.upsert("/a", meta(), Some(1), None));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_open_missing_file_creates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("does-not-exist");
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    assert_eq!(cache.load_path(&path).unwrap(), LoadStatus::Created);
    assert!(cache.is_empty());
}

#[test]
fn test_save_to_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no").join("such").join("dir").join("db");
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    cache.upsert("/a", meta(), Some(1), None);
    let err = cache.save_path(&path).unwrap_err();
    assert!(matches!(err, CacheError::Open { .. }));
    assert!(cache.is_dirty());
}

#[test]
fn test_line_break_paths_are_never_cached() {
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    assert!(cache.upsert("/tmp/good", meta(), Some(1), Some(2)));
    assert!(!cache.upsert("/tmp/evil\nname", meta(), Some(3), Some(4)));
    assert!(!cache.upsert("/tmp/name\r", meta(), Some(5), None));
    assert!(path_key(Path::new("/tmp/evil\nname")).is_none());

    let mut out = Vec::new();
    cache.dump(&mut out).unwrap();
    let mut reloaded = HashCache::new(HashAlgorithm::Xxh64);
    assert_eq!(
        reloaded.load(Cursor::new(out)).unwrap(),
        LoadStatus::Loaded(1)
    );
    assert_eq!(
        reloaded.lookup_or_invalidate("/tmp/good", &meta()),
        Lookup::Hit {
            partial: 1,
            full: Some(2)
        }
    );
}

#[test]
fn test_trailing_carriage_return_is_part_of_path() {
    let line = GOOD_LINE.replace("/good/path", "/good/path\r");
    let input = format!("jdupes hashdb:1,0,5f000000\n{line}\n");
    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    assert_eq!(
        cache.load(Cursor::new(input)).unwrap(),
        LoadStatus::Loaded(1)
    );

    let paths: Vec<&str> = cache.entries().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["/good/path\r"]);
    assert_eq!(
        cache.lookup_or_invalidate("/good/path", &meta()),
        Lookup::Absent
    );
}

#[test]
fn test_invalid_utf8_line_is_reported_with_line_number() {
    let mut input = format!("jdupes hashdb:1,0,5f000000\n{GOOD_LINE}\n").into_bytes();
    input.extend_from_slice(GOOD_LINE.replace("/good/path", "/bad/").as_bytes());
    input.extend_from_slice(b"\xff\xfe\n");

    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    let err = cache.load(Cursor::new(input)).unwrap_err();
    assert!(matches!(err, CacheError::Line { line: 3, .. }));
    assert!(cache.is_empty());
}

#[test]
fn test_failed_save_keeps_previous_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hashdb.txt");

    let mut cache = HashCache::new(HashAlgorithm::Xxh64);
    cache.upsert("/a", meta(), Some(1), None);
    cache.save_path(&path).unwrap();
    let before = fs::read(&path).unwrap();
    assert!(!dir.path().join("hashdb.txt.tmp").exists());

    // A directory in the way of the temporary file makes the next save fail
    fs::create_dir(dir.path().join("hashdb.txt.tmp")).unwrap();
    cache.upsert("/b", meta(), Some(2), None);
    let err = cache.save_path(&path).unwrap_err();
    assert!(matches!(err, CacheError::Open { .. }));
    assert!(cache.is_dirty());
    assert_eq!(fs::read(&path).unwrap(), before);
}
