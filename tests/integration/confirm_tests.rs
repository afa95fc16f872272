use rdupes::duplicates::{
    Confirmation, Confirmer, DuplicateFinder, FileStatus, FinderConfig, MatchOptions,
};
use rdupes::scanner::{FileRecord, RecordId};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn record(dir: &TempDir, name: &str, content: &[u8]) -> FileRecord {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    let meta = fs::metadata(&path).unwrap();
    FileRecord::from_metadata(path, &meta, 0)
}

#[test]
fn test_confirm_large_identical_files() {
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    let a = record(&dir, "a", &content);
    let b = record(&dir, "b", &content);

    let mut confirmer = Confirmer::new(65536, Duration::from_secs(1));
    assert_eq!(confirmer.confirm(&a.path, &b.path, 300_000), Confirmation::Same);
}

#[test]
fn test_confirm_differs_in_middle_chunk() {
    let dir = TempDir::new().unwrap();
    let mut content = vec![9u8; 200_000];
    let a = record(&dir, "a", &content);
    content[100_000] = 10;
    let b = record(&dir, "b", &content);

    let mut confirmer = Confirmer::new(65536, Duration::from_secs(1));
    assert_eq!(
        confirmer.confirm(&a.path, &b.path, 200_000),
        Confirmation::Different
    );
}

#[test]
fn test_colliding_partial_hash_rejected_by_confirmation() {
    let dir = TempDir::new().unwrap();
    let a = record(&dir, "a", &[1u8; 10_000]);
    let mut other = vec![1u8; 10_000];
    other[9_999] = 2;
    let b = record(&dir, "b", &other);

    // Trusting partial hashes makes these two look identical
    let config = FinderConfig::default().with_options(MatchOptions {
        partial_only: true,
        ..Default::default()
    });
    let mut finder = DuplicateFinder::new(config);
    assert_eq!(finder.push(a).unwrap(), FileStatus::Distinct);
    assert_eq!(
        finder.push(b).unwrap(),
        FileStatus::Unconfirmed { of: RecordId(0) }
    );
    let report = finder.finish().unwrap();
    assert!(report.groups.is_empty());
    assert_eq!(report.summary.unconfirmed_matches, 1);
}

#[test]
fn test_quick_mode_trusts_hashes() {
    let dir = TempDir::new().unwrap();
    let a = record(&dir, "a", &[1u8; 10_000]);
    let mut other = vec![1u8; 10_000];
    other[9_999] = 2;
    let b = record(&dir, "b", &other);

    let config = FinderConfig::default().with_quick(true).with_options(MatchOptions {
        partial_only: true,
        ..Default::default()
    });
    let mut finder = DuplicateFinder::new(config);
    finder.push(a).unwrap();
    assert_eq!(
        finder.push(b).unwrap(),
        FileStatus::Duplicate { of: RecordId(0) }
    );
    assert_eq!(finder.finish().unwrap().groups.len(), 1);
}
