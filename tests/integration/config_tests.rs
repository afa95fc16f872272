use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use rdupes::config::{Config, ConfigError};
use rdupes::duplicates::ChainOrder;
use rdupes::scanner::HashAlgorithm;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_defaults_extract() {
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
    assert!(config.hash_db.is_none());
}

#[test]
fn test_config_from_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
chunk_size = 131072
hash_algorithm = "xxh3"
order = "time"
recurse = true
isolate = true
hash_db = "/var/tmp/rdupes.db"
"#,
    )
    .unwrap();

    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.chunk_size, 131_072);
    assert_eq!(config.hash_algorithm, HashAlgorithm::Xxh3);
    assert_eq!(config.order, ChainOrder::Time);
    assert!(config.recurse);
    assert!(config.isolate);
    assert!(!config.quick);
    assert_eq!(
        config.hash_db.as_deref(),
        Some(std::path::Path::new("/var/tmp/rdupes.db"))
    );
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
    assert_eq!(config.partial_hash_size, 4096);
}

#[test]
fn test_config_rejects_zero_chunk_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "chunk_size = 0\n").unwrap();
    let err = Config::load(Some(path.as_path())).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "chunk_size",
            ..
        }
    ));
}

#[test]
fn test_config_rejects_bad_type() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "recurse = \"sometimes\"\n").unwrap();
    assert!(matches!(
        Config::load(Some(path.as_path())),
        Err(ConfigError::Load(_))
    ));
}

#[test]
fn test_config_env_overrides_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "progress_interval_ms = 50\nchunk_size = 8192\n").unwrap();
    std::env::set_var("RDUPES_PROGRESS_INTERVAL_MS", "250");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("RDUPES_"))
        .extract()
        .unwrap();

    std::env::remove_var("RDUPES_PROGRESS_INTERVAL_MS");
    assert_eq!(config.progress_interval_ms, 250);
    assert_eq!(config.chunk_size, 8192);
}
