use std::fs;

use taskpilot::config::{load_config, load_config_file, validate, TaskPilotConfig};

#[test]
fn missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = load_config(dir.path()).expect("defaults");

    assert_eq!(cfg, TaskPilotConfig::default());
    assert_eq!(cfg.agent.id, "agent");
    assert!(cfg.features.auto_reprioritise_active());
    assert_eq!(cfg.pickup.max_concurrent_tasks, 1);
    assert_eq!(cfg.pickup.due_date_urgency_hours, 24);
    assert_eq!(cfg.board.board_path, "board.json");
}

#[test]
fn partial_config_fills_missing_sections_with_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("taskpilot.toml"),
        r#"
[agent]
id = "nightshift"

[pickup]
max_concurrent_tasks = 3
"#,
    )
    .expect("write config");

    let cfg = load_config(dir.path()).expect("load");
    assert_eq!(cfg.agent.id, "nightshift");
    assert_eq!(cfg.pickup.max_concurrent_tasks, 3);
    // Untouched sections keep their defaults
    assert_eq!(cfg.pickup.due_date_urgency_hours, 24);
    assert_eq!(cfg.board.activity_log_path, "activity.jsonl");
    assert!(cfg.features.calendar_v2_enabled);
}

#[test]
fn feature_flags_require_both_to_be_enabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("taskpilot.toml"),
        r#"
[features]
calendar_v2_enabled = false
calendar_auto_reprioritise_enabled = true
"#,
    )
    .expect("write config");

    let cfg = load_config(dir.path()).expect("load");
    assert!(!cfg.features.auto_reprioritise_active());
}

#[test]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("taskpilot.toml");
    fs::write(&path, "[agent\nid = ").expect("write garbage");

    let err = load_config_file(&path).expect_err("malformed config");
    assert!(err.contains("parse"), "unexpected error: {}", err);
}

#[test]
fn validation_collects_every_violation() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("taskpilot.toml"),
        r#"
[agent]
id = "  "

[board]
board_path = ""

[pickup]
max_concurrent_tasks = 0
nightly_start_hour = 25
"#,
    )
    .expect("write config");

    let err = load_config(dir.path()).expect_err("invalid config");
    assert!(err.contains("agent.id"));
    assert!(err.contains("max_concurrent_tasks"));
    assert!(err.contains("nightly_start_hour"));
    assert!(err.contains("board_path"));
}

#[test]
fn validate_accepts_the_defaults() {
    assert!(validate(&TaskPilotConfig::default()).is_ok());
}
