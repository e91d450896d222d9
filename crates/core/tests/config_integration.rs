//! watchpost.toml integration tests
//!
//! - parsing the shipped example
//! - partial files
//! - environment override precedence
//! - malformed input

use watchpost_core::config::{BucketZone, TransitionPolicy, WatchpostConfig};
use watchpost_core::error::{ConfigError, WatchpostError};

const EXAMPLE: &str = include_str!("../../../watchpost.toml.example");

// =============================================================================
// example file
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let config = WatchpostConfig::parse(EXAMPLE).expect("example config should parse");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.data_dir, "./watchpost-data");
    assert!(config.general.operator().is_none());
}

#[test]
fn example_config_passes_validation() {
    let config = WatchpostConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = WatchpostConfig::parse(EXAMPLE).expect("should parse");
    let defaults = WatchpostConfig::default();

    assert_eq!(example.general.log_format, defaults.general.log_format);
    assert_eq!(
        example.ingest.max_lines_per_file,
        defaults.ingest.max_lines_per_file
    );
    assert_eq!(
        example.ingest.accepted_extensions,
        defaults.ingest.accepted_extensions
    );
    assert_eq!(example.query.page_size, defaults.query.page_size);
    assert_eq!(
        example.query.source_list_limit,
        defaults.query.source_list_limit
    );
    assert_eq!(example.analytics.window_days, defaults.analytics.window_days);
    assert_eq!(
        example.analytics.bucket_timezone,
        defaults.analytics.bucket_timezone
    );
    assert_eq!(
        example.lifecycle.transition_policy,
        defaults.lifecycle.transition_policy
    );
    assert_eq!(
        example.notifier.channel_capacity,
        defaults.notifier.channel_capacity
    );
    assert_eq!(example.analysis.max_logs, defaults.analysis.max_logs);
    assert_eq!(example.analysis.max_threats, defaults.analysis.max_threats);
    assert_eq!(example.analysis.timeout_secs, defaults.analysis.timeout_secs);
}

#[test]
fn example_config_uses_local_bucketing() {
    let config = WatchpostConfig::parse(EXAMPLE).expect("should parse");
    assert_eq!(config.analytics.bucket_zone().unwrap(), BucketZone::Local);
}

// =============================================================================
// partial files
// =============================================================================

#[test]
fn partial_config_ingest_only() {
    let toml = r#"
[ingest]
max_lines_per_file = 250
"#;
    let config = WatchpostConfig::parse(toml).expect("should parse");
    assert_eq!(config.ingest.max_lines_per_file, 250);
    assert_eq!(config.ingest.accepted_extensions.len(), 4);
    assert_eq!(config.query.page_size, 100);
}

#[test]
fn partial_config_fixed_offset_bucketing() {
    let toml = r#"
[analytics]
bucket_timezone = "+09:00"
"#;
    let config = WatchpostConfig::parse(toml).expect("should parse");
    config.validate().expect("offset should validate");
    assert!(matches!(
        config.analytics.bucket_zone().unwrap(),
        BucketZone::Fixed(_)
    ));
}

#[test]
fn unknown_field_type_is_a_parse_error() {
    let toml = r#"
[query]
page_size = "lots"
"#;
    let err = WatchpostConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        WatchpostError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
async fn load_from_file_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("watchpost.toml");
    tokio::fs::write(&path, "[general]\noperator = \"on-call\"\n")
        .await
        .expect("write config");

    let config = WatchpostConfig::from_file(&path).await.expect("load");
    assert_eq!(config.general.operator(), Some("on-call"));
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("watchpost.toml");
    tokio::fs::write(&path, "[query]\npage_size = 0\n")
        .await
        .expect("write config");

    let err = WatchpostConfig::from_file(&path).await.unwrap_err();
    assert!(err.to_string().contains("query.page_size"));
}

// =============================================================================
// environment overrides
// =============================================================================

fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: callers are serialized with #[serial].
    unsafe {
        std::env::set_var(key, value);
    }
    let result = f();
    // SAFETY: restore previous state
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;
    let level = with_env("WATCHPOST_GENERAL_LOG_LEVEL", "debug", || {
        let mut config = WatchpostConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.general.log_level
    });
    assert_eq!(level, "debug");
}

#[test]
#[serial_test::serial]
fn env_override_transition_policy() {
    let policy = with_env("WATCHPOST_LIFECYCLE_TRANSITION_POLICY", "permissive", || {
        let mut config = WatchpostConfig::default();
        config.apply_env_overrides();
        config.lifecycle.transition_policy
    });
    assert_eq!(policy, TransitionPolicy::Permissive);
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let cap = with_env("WATCHPOST_INGEST_MAX_LINES_PER_FILE", "42", || {
        let mut config = WatchpostConfig::default();
        config.apply_env_overrides();
        config.ingest.max_lines_per_file
    });
    assert_eq!(cap, 42);
}

#[test]
#[serial_test::serial]
fn env_override_csv_field() {
    let extensions = with_env("WATCHPOST_INGEST_ACCEPTED_EXTENSIONS", "log, jsonl", || {
        let mut config = WatchpostConfig::default();
        config.apply_env_overrides();
        config.ingest.accepted_extensions
    });
    assert_eq!(extensions, vec!["log", "jsonl"]);
}

#[test]
#[serial_test::serial]
fn env_override_with_invalid_number_keeps_toml_value() {
    let page = with_env("WATCHPOST_QUERY_PAGE_SIZE", "fifty", || {
        let mut config = WatchpostConfig::parse("[query]\npage_size = 50").expect("parse");
        config.apply_env_overrides();
        config.query.page_size
    });
    assert_eq!(page, 50);
}
