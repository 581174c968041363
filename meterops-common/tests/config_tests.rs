//! Configuration loading and root folder resolution
//!
//! Tests that manipulate METEROPS_ROOT_FOLDER are marked #[serial] so they do
//! not race each other.

use meterops_common::config::{resolve_root_folder, ServiceConfig, ROOT_FOLDER_ENV};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/meterops-env");
    let config = ServiceConfig {
        root_folder: Some(PathBuf::from("/tmp/meterops-file")),
        ..ServiceConfig::default()
    };

    let root = resolve_root_folder(Some(Path::new("/tmp/meterops-cli")), &config);
    assert_eq!(root, PathBuf::from("/tmp/meterops-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_config_file() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/meterops-env");
    let config = ServiceConfig {
        root_folder: Some(PathBuf::from("/tmp/meterops-file")),
        ..ServiceConfig::default()
    };

    assert_eq!(
        resolve_root_folder(None, &config),
        PathBuf::from("/tmp/meterops-env")
    );

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_config_file_beats_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = ServiceConfig {
        root_folder: Some(PathBuf::from("/tmp/meterops-file")),
        ..ServiceConfig::default()
    };

    assert_eq!(
        resolve_root_folder(None, &config),
        PathBuf::from("/tmp/meterops-file")
    );
}

#[test]
#[serial]
fn test_default_root_folder_used_last() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = resolve_root_folder(None, &ServiceConfig::default());
    assert!(!root.as_os_str().is_empty());
    assert!(root.to_string_lossy().contains("meterops"));
}

#[test]
fn test_load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        host = "127.0.0.1"
        port = 4100
        log_level = "debug"

        [auth]
        issuer = "https://issuer.example.com"
        signing_secret = "a-long-enough-signing-secret"
        "#,
    )
    .unwrap();

    let (config, source) = ServiceConfig::load(Some(&path)).unwrap();
    assert_eq!(source.as_deref(), Some(path.as_path()));
    assert_eq!(config.bind_address(), "127.0.0.1:4100");
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.auth.issuer.as_deref(), Some("https://issuer.example.com"));
}

#[test]
fn test_load_missing_explicit_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = ServiceConfig::load(Some(&dir.path().join("absent.toml")));
    assert!(result.is_err());
}
