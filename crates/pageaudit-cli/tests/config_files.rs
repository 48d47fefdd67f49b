//! Config file loading and layering against real files on disk.

use std::io::Write;
use std::time::Duration;

use pageaudit::Category;
use pageaudit_cli::{AuditConfig, CliError};

// ─────────────────────── helpers ───────────────────────

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

// ─────────────────────── tests ───────────────────────

#[test]
fn test_01_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"{ "categories": ["seo", "security"], "unit_timeout_secs": 10, "ai": { "enabled": true } }"#,
    );

    let config = AuditConfig::load(Some(&path)).unwrap();
    assert_eq!(config.categories().unwrap(), vec![Category::Seo, Category::Security]);
    assert_eq!(config.run_options().unit_timeout, Duration::from_secs(10));
    assert_eq!(config.run_options().ai_timeout, Duration::from_secs(30));
    assert!(config.ai.enabled);
    assert_eq!(config.ai.model, AuditConfig::default().ai.model);
}

#[test]
fn test_02_env_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"{ "ai": { "api_key": "from-file", "model": "file-model" }, "unit_timeout_secs": 10 }"#,
    );

    let mut config = AuditConfig::load(Some(&path)).unwrap();
    config
        .apply_env(|key| match key {
            "PAGEAUDIT_LLM_API_KEY" => Some("from-env".to_string()),
            "PAGEAUDIT_UNIT_TIMEOUT_SECS" => Some("45".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.ai.api_key.as_deref(), Some("from-env"));
    assert_eq!(config.ai.model, "file-model");
    assert_eq!(config.unit_timeout_secs, 45);
}

#[test]
fn test_03_malformed_file_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "{ not json");

    let err = AuditConfig::load(Some(&path)).unwrap_err();
    match err {
        CliError::ConfigParse { path: reported, .. } => {
            assert_eq!(reported, path.display().to_string());
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_04_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(matches!(
        AuditConfig::load(Some(&path)),
        Err(CliError::Config(_))
    ));
}

#[test]
fn test_05_explicit_path_resolves() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{ "fetch_timeout_secs": 5 }"#);

    let config = AuditConfig::resolve(path.to_str()).unwrap();
    assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
}

#[test]
fn test_06_pagespeed_enabled_without_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{ "pagespeed": { "enabled": true } }"#);

    let config = AuditConfig::load(Some(&path)).unwrap();
    assert!(config.metrics_provider().is_some());
    assert!(config.language_model().is_none());
}

#[test]
fn test_07_ai_generation_settings_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"{ "ai": { "enabled": true, "max_tokens": 300, "temperature": 0.1 } }"#,
    );

    let options = AuditConfig::load(Some(&path)).unwrap().run_options();
    assert!(options.ai_recommendations);
    assert_eq!(options.ai_max_tokens, 300);
    assert_eq!(options.ai_temperature, 0.1);

    let defaults = AuditConfig::default().run_options();
    assert_eq!(defaults.ai_max_tokens, pageaudit::DEFAULT_MAX_TOKENS);
    assert_eq!(defaults.ai_temperature, pageaudit::DEFAULT_TEMPERATURE);
}
