use clap::Parser;
use rdupes::cli::Cli;
use rdupes::error::ExitCode;
use std::fs;
use tempfile::TempDir;

fn run(dir: &TempDir, extra: &[&str]) -> ExitCode {
    let config = dir.path().join("no-config.toml");
    let data = dir.path().join("data");
    let mut args = vec![
        "rdupes".to_string(),
        "-q".to_string(),
        "--no-progress".to_string(),
        "--config".to_string(),
        config.display().to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    args.push(data.display().to_string());

    let cli = Cli::try_parse_from(args).unwrap();
    rdupes::run_app(cli).unwrap()
}

fn populate(dir: &TempDir) {
    let data = dir.path().join("data");
    fs::create_dir_all(data.join("nested")).unwrap();
    fs::write(data.join("one"), b"payload").unwrap();
    fs::write(data.join("nested/two"), b"payload").unwrap();
    fs::write(data.join("three"), b"different").unwrap();
}

#[test]
fn test_run_app_exit_codes() {
    let dir = TempDir::new().unwrap();
    populate(&dir);

    assert_eq!(run(&dir, &[]), ExitCode::NoDuplicates);
    assert_eq!(run(&dir, &["-r"]), ExitCode::Success);
    assert_eq!(run(&dir, &["-r", "-e"]), ExitCode::DuplicateFound);
}

#[test]
fn test_run_app_writes_hash_db() {
    let dir = TempDir::new().unwrap();
    populate(&dir);
    let db = dir.path().join("cache").join("hashdb.txt");
    let db_arg = db.display().to_string();

    assert_eq!(run(&dir, &["-r", "-y", &db_arg]), ExitCode::Success);
    let content = fs::read_to_string(&db).unwrap();
    assert!(content.starts_with("jdupes hashdb:1,0,"));
    assert_eq!(content.lines().count(), 3);
}
