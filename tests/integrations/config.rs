use alert_dispatch::cli::SettingsArgs;
use alert_dispatch::config::{AppConfig, OutputsConfig};
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        region = "eu-west-1"
        qualifier = "prod_east_streamalert_alert_processor"
        cache_dir = "/var/cache/alert-dispatch"
        outputs_config = "/etc/alert-dispatch/outputs.json"
        [aws]
        s3_endpoint = "http://localhost:4566"
    "#;

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();

    let args = SettingsArgs {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    let config = AppConfig::load(&args).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.region, "eu-west-1");
    assert_eq!(config.qualifier, "prod_east_streamalert_alert_processor");
    assert_eq!(config.cache_root(), PathBuf::from("/var/cache/alert-dispatch"));
    assert_eq!(
        config.outputs_config,
        PathBuf::from("/etc/alert-dispatch/outputs.json")
    );
    assert_eq!(config.aws.s3_endpoint.as_deref(), Some("http://localhost:4566"));
    assert_eq!(config.aws.kms_endpoint, None); // Not in the toml, so it should be the default value
}

#[test]
fn test_cli_flags_override_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "region = \"eu-west-1\"\nlog_level = \"warn\"").unwrap();

    let args = SettingsArgs {
        config: Some(file.path().to_path_buf()),
        region: Some("ap-southeast-2".to_string()),
        cache_dir: Some(PathBuf::from("/tmp/creds")),
        ..Default::default()
    };

    let config = AppConfig::load(&args).unwrap();

    assert_eq!(config.region, "ap-southeast-2");
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/creds")));
}

#[test]
fn test_defaults_without_file() {
    let config = AppConfig::load(&SettingsArgs::default()).unwrap();

    assert_eq!(config.qualifier, "streamalert_alert_processor");
    assert_eq!(config.outputs_config, PathBuf::from("conf/outputs.json"));
}

#[test]
fn test_outputs_config_persists_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf").join("outputs.json");

    let mut outputs = OutputsConfig::default();
    outputs.insert("slack", vec!["ops".to_string(), "alerts".to_string()]);
    outputs.save(&path).unwrap();

    let loaded = OutputsConfig::load(&path).unwrap();
    assert_eq!(loaded, outputs);
    assert!(loaded.contains("slack", "ops"));
}

#[test]
fn test_outputs_config_load_errors() {
    let dir = TempDir::new().unwrap();
    assert!(OutputsConfig::load(dir.path().join("missing.json")).is_err());

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = OutputsConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse outputs config"));
}
