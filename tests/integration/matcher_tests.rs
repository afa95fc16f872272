use rdupes::duplicates::{
    chain_members, collect_groups, ChainOrder, Classification, MatchOptions, Matcher,
};
use rdupes::scanner::{FileHasher, FileRecord, HasherConfig, RecordId};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_record(dir: &TempDir, name: &str, content: &[u8]) -> FileRecord {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    let meta = fs::metadata(&path).unwrap();
    FileRecord::from_metadata(path, &meta, 0)
}

fn classify_all(matcher: &mut Matcher, records: &mut Vec<FileRecord>) -> Vec<Classification> {
    let mut results = Vec::new();
    for i in 0..records.len() {
        let id = RecordId(i);
        let result = matcher.classify(records, id).unwrap();
        if let Classification::Duplicate {
            node,
            hard_link: false,
            ..
        } = result
        {
            matcher.register(records, node, id, |a, b| ChainOrder::Name.compare(a, b));
        }
        results.push(result);
    }
    results
}

#[test]
fn test_two_of_three_same_size_files_match() {
    let dir = TempDir::new().unwrap();
    let mut records = vec![
        write_record(&dir, "a", &[b'X'; 100]),
        write_record(&dir, "b", &[b'X'; 100]),
        write_record(&dir, "c", &[b'Y'; 100]),
    ];

    let mut matcher = Matcher::new(FileHasher::new(HasherConfig::default()), MatchOptions::default());
    let results = classify_all(&mut matcher, &mut records);

    assert_eq!(results[0], Classification::Inserted(rdupes::duplicates::NodeId(0)));
    assert!(matches!(
        results[1],
        Classification::Duplicate { of: RecordId(0), hard_link: false, .. }
    ));
    assert!(matches!(results[2], Classification::Inserted(_)));

    // 100 bytes is within the partial prefix, so no full hash was read
    assert_eq!(matcher.stats().full_hashes, 0);
    assert_eq!(records[1].full_hash, records[1].partial_hash);
    assert_ne!(records[2].partial_hash, records[0].partial_hash);

    let groups = collect_groups(&records);
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].paths(),
        vec![dir.path().join("a"), dir.path().join("b")]
    );
    assert_eq!(matcher.len(), 2);
    assert!(!records[2].has_duplicates);
    assert!(records[2].next_duplicate.is_none());
}

#[test]
fn test_different_sizes_are_never_read() {
    // None of these paths exist; any read would fail the classification
    let mut records: Vec<FileRecord> = (1..=20u64)
        .map(|size| FileRecord::new(PathBuf::from(format!("/nonexistent/{size}")), size * 7, 0))
        .collect();

    let mut matcher = Matcher::new(FileHasher::new(HasherConfig::default()), MatchOptions::default());
    for result in classify_all(&mut matcher, &mut records) {
        assert!(matches!(result, Classification::Inserted(_)));
    }
    assert_eq!(matcher.stats().partial_hashes, 0);
    assert_eq!(matcher.stats().full_hashes, 0);
    assert!(records.iter().all(|r| r.partial_hash.is_none()));
}

#[test]
fn test_large_files_sharing_prefix() {
    let dir = TempDir::new().unwrap();
    let base = vec![0x5au8; 20_000];
    let mut tail = base.clone();
    tail[19_999] = 0;

    let mut records = vec![
        write_record(&dir, "one", &base),
        write_record(&dir, "two", &tail),
        write_record(&dir, "three", &base),
    ];

    let mut matcher = Matcher::new(FileHasher::new(HasherConfig::default()), MatchOptions::default());
    let results = classify_all(&mut matcher, &mut records);
    assert!(matches!(results[1], Classification::Inserted(_)));
    assert!(matches!(results[2], Classification::Duplicate { of: RecordId(0), .. }));

    let head = RecordId(0);
    let chain: Vec<RecordId> = chain_members(&records, head).collect();
    assert_eq!(chain, vec![RecordId(0), RecordId(2)]);
    assert_eq!(records[0].partial_hash, records[1].partial_hash);
    assert_ne!(records[0].full_hash, records[1].full_hash);
}

#[test]
fn test_identical_content_grouped_in_any_order() {
    let dir = TempDir::new().unwrap();
    let files = [
        ("p", vec![1u8; 5000]),
        ("q", vec![2u8; 5000]),
        ("r", vec![1u8; 5000]),
        ("s", vec![1u8; 300]),
        ("t", vec![1u8; 5000]),
    ];
    for (name, content) in &files {
        fs::write(dir.path().join(name), content).unwrap();
    }

    let orders: [[usize; 5]; 3] = [[0, 1, 2, 3, 4], [4, 3, 2, 1, 0], [2, 0, 4, 1, 3]];
    for order in orders {
        let mut records: Vec<FileRecord> = order
            .iter()
            .map(|&i| {
                let path = dir.path().join(files[i].0);
                let meta = fs::metadata(&path).unwrap();
                FileRecord::from_metadata(path, &meta, 0)
            })
            .collect();

        let mut matcher =
            Matcher::new(FileHasher::new(HasherConfig::default()), MatchOptions::default());
        classify_all(&mut matcher, &mut records);

        let groups = collect_groups(&records);
        assert_eq!(groups.len(), 1, "order {order:?}");
        assert_eq!(
            groups[0].paths(),
            vec![
                dir.path().join("p"),
                dir.path().join("r"),
                dir.path().join("t")
            ],
            "order {order:?}"
        );
    }
}

#[test]
fn test_isolate_keeps_roots_apart() {
    let dir = TempDir::new().unwrap();
    let mut records = vec![
        write_record(&dir, "a1", b"shared content").with_user_order(0),
        write_record(&dir, "a2", b"shared content").with_user_order(0),
        write_record(&dir, "b1", b"shared content").with_user_order(1),
    ];

    let options = MatchOptions {
        isolate: true,
        ..Default::default()
    };
    let mut matcher = Matcher::new(FileHasher::new(HasherConfig::default()), options);
    let results = classify_all(&mut matcher, &mut records);

    assert!(matches!(results[1], Classification::Inserted(_)));
    assert!(matches!(results[2], Classification::Duplicate { .. }));
    assert_eq!(matcher.stats().excluded_pairs, 1);
}

#[cfg(unix)]
#[test]
fn test_hard_links() {
    let dir = TempDir::new().unwrap();
    let original = write_record(&dir, "original", b"linked content");
    let link_path = dir.path().join("link");
    fs::hard_link(&original.path, &link_path).unwrap();
    let link_meta = fs::metadata(&link_path).unwrap();
    let link = FileRecord::from_metadata(link_path, &link_meta, 0);

    let mut records = vec![original.clone(), link.clone()];
    let mut matcher = Matcher::new(FileHasher::new(HasherConfig::default()), MatchOptions::default());
    let results = classify_all(&mut matcher, &mut records);
    assert_eq!(
        results[1],
        Classification::HardLinkRejected { of: RecordId(0) }
    );

    let mut records = vec![original, link];
    let options = MatchOptions {
        consider_hardlinks: true,
        ..Default::default()
    };
    let mut matcher = Matcher::new(FileHasher::new(HasherConfig::default()), options);
    let results = classify_all(&mut matcher, &mut records);
    assert!(matches!(
        results[1],
        Classification::Duplicate { hard_link: true, .. }
    ));
    assert_eq!(matcher.stats().partial_hashes, 0);
    assert_eq!(matcher.stats().hard_link_merges, 1);
}
