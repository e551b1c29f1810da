//! Integration tests for trellis-config

use serde_json::json;
use std::io::Write;
use trellis_config::*;

#[test]
fn test_builder_layers_file_over_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[session]\nLIFETIME = 60").unwrap();

    let config = ConfigBuilder::new()
        .defaults(json!({"session": {"LIFETIME": 7200, "DRIVER": "file"}}))
        .add_file(file.path())
        .build()
        .unwrap();

    assert_eq!(config.get_int("session.LIFETIME").unwrap(), 60);
    assert_eq!(config.get_string("session.DRIVER").unwrap(), "file");
}

#[test]
fn test_load_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{"middleware": {{"GLOBAL": ["session", "csrf"]}}}}"#
    )
    .unwrap();

    let config = ConfigManager::new();
    config.load_file(file.path()).unwrap();

    let global: Vec<String> = config.get("middleware.GLOBAL").unwrap();
    assert_eq!(global, vec!["session", "csrf"]);
}

#[test]
fn test_missing_file_is_an_error() {
    let config = ConfigManager::new();
    let result = config.load_file("/definitely/not/here.toml");
    assert!(matches!(result, Err(ConfigError::LoadError(_))));
}

#[test]
fn test_env_file_format() {
    let mut file = tempfile::Builder::new().suffix(".env").tempfile().unwrap();
    writeln!(file, "SECURITY__CSRF_ENABLED=true\nAPP__APP_SECRET_KEY=s3cret").unwrap();

    let config = ConfigManager::new();
    config.load_file(file.path()).unwrap();

    assert!(config.get_bool("security.CSRF_ENABLED").unwrap());
    assert_eq!(config.get_string("app.APP_SECRET_KEY").unwrap(), "s3cret");
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::KeyNotFound("session.DRIVER".to_string());
    assert!(err.to_string().contains("session.DRIVER"));
}
