use rdupes::duplicates::{ChainOrder, DuplicateFinder, FinderConfig, MatchOptions, Outcome};
use rdupes::error::ExitCode;
use rdupes::print_report;
use rdupes::scanner::{Walker, WalkerConfig};
use rdupes::signal::CancelToken;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn populate(root: &Path) {
    fs::create_dir_all(root.join("sub/deeper")).unwrap();
    fs::write(root.join("a.txt"), b"duplicate body").unwrap();
    fs::write(root.join("sub/b.txt"), b"duplicate body").unwrap();
    fs::write(root.join("sub/deeper/c.txt"), b"duplicate body").unwrap();
    fs::write(root.join("unique.txt"), b"only one of these").unwrap();
    fs::write(root.join("empty1"), b"").unwrap();
    fs::write(root.join("sub/empty2"), b"").unwrap();
}

fn scan(roots: &[&Path], walker: WalkerConfig, finder: FinderConfig) -> rdupes::duplicates::FinderReport {
    let walker = Walker::new(roots.iter().map(|p| p.to_path_buf()).collect(), walker);
    let mut finder = DuplicateFinder::new(finder);
    finder.run(walker.walk()).unwrap();
    finder.finish().unwrap()
}

#[test]
fn test_recursive_scan_finds_group() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());

    let report = scan(
        &[dir.path()],
        WalkerConfig {
            recurse: true,
            ..Default::default()
        },
        FinderConfig::default(),
    );

    assert_eq!(report.groups.len(), 1);
    assert_eq!(
        report.groups[0].paths(),
        vec![
            dir.path().join("a.txt"),
            dir.path().join("sub/b.txt"),
            dir.path().join("sub/deeper/c.txt"),
        ]
    );
    assert_eq!(report.summary.total_files, 4);
    assert_eq!(ExitCode::from_report(&report), ExitCode::Success);
}

#[test]
fn test_non_recursive_scan_has_no_duplicates() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());

    let report = scan(&[dir.path()], WalkerConfig::default(), FinderConfig::default());
    assert!(report.groups.is_empty());
    assert_eq!(ExitCode::from_report(&report), ExitCode::NoDuplicates);
}

#[test]
fn test_zero_length_files_match_when_included() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());

    let report = scan(
        &[dir.path()],
        WalkerConfig {
            recurse: true,
            include_empty: true,
            ..Default::default()
        },
        FinderConfig::default(),
    );
    assert_eq!(report.groups.len(), 2);
    assert!(report.groups.iter().any(|g| g.size == 0 && g.len() == 2));
}

#[test]
fn test_isolate_across_roots() {
    let dir = TempDir::new().unwrap();
    let left = dir.path().join("left");
    let right = dir.path().join("right");
    fs::create_dir_all(&left).unwrap();
    fs::create_dir_all(&right).unwrap();
    fs::write(left.join("1"), b"same bytes").unwrap();
    fs::write(left.join("2"), b"same bytes").unwrap();
    fs::write(right.join("3"), b"same bytes").unwrap();

    let finder = FinderConfig::default().with_options(MatchOptions {
        isolate: true,
        ..Default::default()
    });
    let report = scan(&[left.as_path(), right.as_path()], WalkerConfig::default(), finder);

    assert_eq!(report.groups.len(), 1);
    let paths = report.groups[0].paths();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&right.join("3")));
}

#[test]
fn test_time_order() {
    let dir = TempDir::new().unwrap();
    for (name, secs) in [("a", 3_000_000), ("b", 1_000_000), ("c", 2_000_000)] {
        let path = dir.path().join(name);
        fs::write(&path, b"timed").unwrap();
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
    }

    let report = scan(
        &[dir.path()],
        WalkerConfig::default(),
        FinderConfig::default().with_order(ChainOrder::Time),
    );
    assert_eq!(
        report.groups[0].paths(),
        vec![
            dir.path().join("b"),
            dir.path().join("c"),
            dir.path().join("a")
        ]
    );
}

#[test]
fn test_stop_on_first_exit_code() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());

    let report = scan(
        &[dir.path()],
        WalkerConfig {
            recurse: true,
            ..Default::default()
        },
        FinderConfig::default().with_stop_on_first(true),
    );
    assert!(matches!(report.outcome, Outcome::Stopped { .. }));
    assert_eq!(ExitCode::from_report(&report), ExitCode::DuplicateFound);
}

#[test]
fn test_cancelled_run_is_interrupted() {
    let dir = TempDir::new().unwrap();
    populate(dir.path());
    let token = CancelToken::new();
    token.cancel();

    let walker = Walker::new(vec![dir.path().to_path_buf()], WalkerConfig::default())
        .with_cancel_token(token.clone());
    let mut finder = DuplicateFinder::new(FinderConfig::default().with_cancel_token(token));
    let err = finder.run(walker.walk()).unwrap_err();
    assert!(matches!(err, rdupes::duplicates::FinderError::Interrupted));
}

#[test]
fn test_print_report_layout() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("x"), b"12345").unwrap();
    fs::write(dir.path().join("y"), b"12345").unwrap();
    fs::write(dir.path().join("p"), b"abc").unwrap();
    fs::write(dir.path().join("q"), b"abc").unwrap();

    let report = scan(&[dir.path()], WalkerConfig::default(), FinderConfig::default());
    let mut out = Vec::new();
    print_report(&report, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let blocks: Vec<&str> = text.split("\n\n").filter(|b| !b.is_empty()).collect();
    assert_eq!(blocks.len(), 2);
    for block in blocks {
        assert_eq!(block.lines().count(), 2);
    }
    assert!(text.ends_with("\n\n"));
}
