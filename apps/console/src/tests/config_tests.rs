use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_match_the_canned_sample() {
    let settings = ConsoleSettings::default();
    assert_eq!(settings.response_delay(), Duration::from_secs(2));
    assert_eq!(settings.response_timeout(), Duration::from_secs(10));
    assert_eq!(settings.log_filter, "info");
    assert!(settings.fail_kinds.is_empty());
}

#[test]
fn file_overrides_known_keys_and_ignores_the_rest() {
    let mut settings = ConsoleSettings::default();
    settings
        .apply_file_overrides(
            r#"
            response_delay_ms = "150"
            log_filter = "debug"
            fail_kinds = "2"
            theme = "dark"
            "#,
        )
        .expect("valid file");

    assert_eq!(settings.response_delay_ms, 150);
    assert_eq!(settings.response_timeout_ms, 10_000);
    assert_eq!(settings.log_filter, "debug");
    assert_eq!(settings.fail_kinds, vec![RequestKind::Second]);
}

#[test]
fn env_wins_over_file() {
    let mut settings = ConsoleSettings::default();
    settings
        .apply_file_overrides(r#"response_delay_ms = "150""#)
        .expect("valid file");
    settings
        .apply_env_overrides(|key| match key {
            "APP__RESPONSE_DELAY_MS" => Some("20".to_string()),
            "APP__FAIL_KINDS" => Some("first, second, 1".to_string()),
            _ => None,
        })
        .expect("valid env");

    assert_eq!(settings.response_delay_ms, 20);
    assert_eq!(
        settings.fail_kinds,
        vec![RequestKind::First, RequestKind::Second]
    );
}

#[test]
fn rejects_malformed_values() {
    let mut settings = ConsoleSettings::default();
    let err = settings
        .apply_file_overrides(r#"response_timeout_ms = "soon""#)
        .expect_err("not a number");
    assert!(err.to_string().contains("response_timeout_ms"));

    let err = settings
        .apply_env_overrides(|key| (key == "APP__FAIL_KINDS").then(|| "third".to_string()))
        .expect_err("unknown kind");
    assert!(err.to_string().contains("APP__FAIL_KINDS"));

    settings.apply_env_overrides(no_env).expect("nothing to apply");
    assert_eq!(settings.response_timeout_ms, 10_000);
}

#[test]
fn explicit_config_path_must_exist() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let missing = env::temp_dir().join(format!("feedback_console_missing_{suffix}.toml"));

    let err = load_settings(Some(&missing)).expect_err("missing file");
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn explicit_config_path_is_loaded() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("feedback_console_{suffix}.toml"));
    fs::write(&path, "response_timeout_ms = \"750\"\n").expect("write config");

    let settings = load_settings(Some(&path)).expect("load");
    fs::remove_file(&path).expect("cleanup");

    assert_eq!(settings.response_timeout_ms, 750);
}
