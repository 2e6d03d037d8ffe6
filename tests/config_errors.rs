// tests/config_errors.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use tickdag::config::load_and_validate;
use tickdag::errors::TickdagError;

#[test]
fn dag_cycle_returns_structured_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[task.extract]
cmd = "echo extract"
daily_at = "02:00"
after = ["report"]

[task.report]
cmd = "echo report"
daily_at = "03:00"
after = ["extract"]
"#
    )
    .unwrap();

    let result = load_and_validate(file.path());

    match result {
        Err(TickdagError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("extract") || msg.contains("report"));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_dependency_returns_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[task.report]
cmd = "echo report"
daily_at = "03:00"
after = ["NonExistent"]
"#
    )
    .unwrap();

    let result = load_and_validate(file.path());

    match result {
        Err(TickdagError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn missing_schedule_returns_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[task.report]
cmd = "echo report"
"#
    )
    .unwrap();

    match load_and_validate(file.path()) {
        Err(TickdagError::ConfigError(msg)) => {
            assert!(msg.contains("needs a schedule"));
        }
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn missing_file_returns_io_error() {
    let result = load_and_validate("/definitely/not/here/Tickdag.toml");
    assert!(matches!(result, Err(TickdagError::IoError(_))));
}

#[test]
fn malformed_toml_returns_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[task.report\ncmd =").unwrap();

    let result = load_and_validate(file.path());
    assert!(matches!(result, Err(TickdagError::TomlError(_))));
}

#[test]
fn full_config_parses_with_overrides_and_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[scheduler]
check_interval_secs = 30
retry_delay_secs = 60

[task.extract]
cmd = "echo extract"
description = "pull the raw data"
daily_at = "02:00"
max_retries = 5

[task.report]
cmd = "echo report"
weekly_at = "mon 08:00"
after = ["extract"]
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();

    let settings = cfg.scheduler.to_settings();
    assert_eq!(settings.check_interval, Duration::from_secs(30));
    // Unset [scheduler] keys fall back to defaults.
    assert_eq!(settings.shutdown_grace, Duration::from_secs(30));
    assert_eq!(settings.default_retry.max_retries, 3);
    assert_eq!(settings.default_retry.retry_delay, Duration::from_secs(60));

    let extract = &cfg.task["extract"];
    assert_eq!(extract.description, "pull the raw data");
    let policy = extract.retry_override.unwrap();
    assert_eq!(policy.max_retries, 5);
    // Per-task override inherits the scheduler-level delay.
    assert_eq!(policy.retry_delay, Duration::from_secs(60));

    let report = &cfg.task["report"];
    assert_eq!(report.after, vec!["extract".to_string()]);
    assert!(report.retry_override.is_none());
}
