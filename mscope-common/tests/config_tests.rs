//! Configuration resolution tests
//!
//! Tests touching MSCOPE_* environment variables are marked #[serial] so they
//! never observe each other's overrides.

use mscope_common::config::{
    ConfigResolver, IngestConfig, RootPolicy, ENV_DATABASE, ENV_DATA_ROOTS, ENV_ROOT_POLICY,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ENV_DATA_ROOTS);
    env::remove_var(ENV_DATABASE);
    env::remove_var(ENV_ROOT_POLICY);
}

#[test]
#[serial]
fn test_explicit_config_file_is_loaded() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        data_roots = ["/data/rig1", "/data/rig2"]
        root_policy = "error-on-ambiguous"
        frame_rate_cv_threshold = 0.25
        max_concurrent_recordings = 4

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    let config = ConfigResolver::new().with_config_file(&path).resolve().unwrap();

    assert_eq!(
        config.data_roots,
        vec![PathBuf::from("/data/rig1"), PathBuf::from("/data/rig2")]
    );
    assert_eq!(config.root_policy, RootPolicy::ErrorOnAmbiguous);
    assert_eq!(config.frame_rate_cv_threshold, 0.25);
    assert_eq!(config.max_concurrent_recordings, 4);
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_missing_explicit_config_file_is_an_error() {
    clear_env();
    let result = ConfigResolver::new()
        .with_config_file("/nonexistent/mscope/config.toml")
        .resolve();
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "data_roots = [\"/from/file\"]\n").unwrap();

    let roots = env::join_paths([PathBuf::from("/env/a"), PathBuf::from("/env/b")]).unwrap();
    env::set_var(ENV_DATA_ROOTS, &roots);
    env::set_var(ENV_DATABASE, "/tmp/mscope-env.db");
    env::set_var(ENV_ROOT_POLICY, "error-on-ambiguous");

    let config = ConfigResolver::new().with_config_file(&path).resolve().unwrap();
    clear_env();

    assert_eq!(config.data_roots, vec![PathBuf::from("/env/a"), PathBuf::from("/env/b")]);
    assert_eq!(config.database_path(), PathBuf::from("/tmp/mscope-env.db"));
    assert_eq!(config.root_policy, RootPolicy::ErrorOnAmbiguous);
}

#[test]
#[serial]
fn test_invalid_env_policy_is_rejected() {
    clear_env();
    env::set_var(ENV_ROOT_POLICY, "whatever");
    let mut config = IngestConfig::default();
    let result = config.apply_env();
    clear_env();
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_invalid_threshold_fails_validation() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "frame_rate_cv_threshold = -1.0\n").unwrap();

    assert!(ConfigResolver::new().with_config_file(&path).resolve().is_err());
}
