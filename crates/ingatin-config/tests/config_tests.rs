// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Ingat-In configuration system.

use ingatin_config::diagnostic::{ConfigError, suggest_key};
use ingatin_config::model::IngatinConfig;
use ingatin_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_ingatin_config() {
    let toml = r#"
[dashboard]
log_level = "debug"
utc_offset_hours = 8
protected_prefixes = ["/dashboard"]

[supabase]
url = "https://abcd.supabase.co"
anon_key = "anon-123"
users_table = "peserta"

[realtime]
enabled = false
heartbeat_secs = 30

[bot]
whatsapp_number = "081234"
greeting = "Halo bot"

[session]
persist = false
path = "/tmp/ingatin-session.json"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.dashboard.log_level, "debug");
    assert_eq!(config.dashboard.utc_offset_hours, 8);
    assert_eq!(config.dashboard.protected_prefixes, vec!["/dashboard"]);
    assert_eq!(
        config.supabase.url.as_deref(),
        Some("https://abcd.supabase.co")
    );
    assert_eq!(config.supabase.anon_key.as_deref(), Some("anon-123"));
    assert_eq!(config.supabase.users_table, "peserta");
    assert_eq!(config.supabase.schema, "public");
    assert!(!config.realtime.enabled);
    assert_eq!(config.realtime.heartbeat_secs, 30);
    assert_eq!(config.bot.whatsapp_number.as_deref(), Some("081234"));
    assert_eq!(config.bot.greeting.as_deref(), Some("Halo bot"));
    assert!(!config.session.persist);
}

/// Unknown field in [supabase] is rejected with a suggestion.
#[test]
fn unknown_field_produces_suggestion() {
    let toml = r#"
[supabase]
anon_kye = "abc"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "anon_kye");
            assert_eq!(suggestion.as_deref(), Some("anon_key"));
            assert!(span.is_some(), "inline source should resolve a span");
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "abc"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown section");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("telegram"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Wrong value type surfaces as InvalidType.
#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[realtime]
heartbeat_secs = "soon"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject string for integer");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("heartbeat_secs"))),
        "expected InvalidType for heartbeat_secs, got {errors:?}"
    );
}

/// Empty config yields the defaults.
#[test]
fn empty_config_uses_defaults() {
    let config = load_and_validate_str("").expect("empty config is valid");
    let defaults = IngatinConfig::default();
    assert_eq!(config.dashboard.login_route, defaults.dashboard.login_route);
    assert_eq!(config.realtime.inbox_capacity, defaults.realtime.inbox_capacity);
    assert!(config.supabase.url.is_none());
}

/// Semantic validation runs after deserialization.
#[test]
fn validation_rejects_bad_url() {
    let toml = r#"
[supabase]
url = "ftp://abcd.supabase.co"
"#;

    let errors = load_and_validate_str(toml).expect_err("bad scheme");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("supabase.url")))
    );
}

/// Loading from an explicit path reads the file.
#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingatin.toml");
    std::fs::write(
        &path,
        "[bot]\nwhatsapp_number = \"0899\"\n[realtime]\ninbox_capacity = 4\n",
    )
    .unwrap();

    let config = load_and_validate_path(&path).expect("file config is valid");
    assert_eq!(config.bot.whatsapp_number.as_deref(), Some("0899"));
    assert_eq!(config.realtime.inbox_capacity, 4);
}

/// A typo in an explicit file points at the file.
#[test]
fn load_from_path_reports_span() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingatin.toml");
    std::fs::write(&path, "[dashboard]\nlog_levl = \"debug\"\n").unwrap();

    let errors = load_and_validate_path(&path).expect_err("typo");
    match &errors[0] {
        ConfigError::UnknownKey {
            suggestion, span, ..
        } => {
            assert_eq!(suggestion.as_deref(), Some("log_level"));
            assert!(span.is_some());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// `INGATIN_<SECTION>_<KEY>` beats the file.
#[test]
#[serial_test::serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingatin.toml");
    std::fs::write(&path, "[realtime]\ninbox_capacity = 4\n").unwrap();

    // SAFETY: serialized with every other env-reading test.
    unsafe { std::env::set_var("INGATIN_REALTIME_INBOX_CAPACITY", "9") };
    let result = load_and_validate_path(&path);
    unsafe { std::env::remove_var("INGATIN_REALTIME_INBOX_CAPACITY") };

    let config = result.expect("env override is valid");
    assert_eq!(config.realtime.inbox_capacity, 9);
}

/// Loads `file` with one env var set for the duration of the load.
fn load_with_env(file: &str, var: &str, value: &str) -> IngatinConfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingatin.toml");
    std::fs::write(&path, file).unwrap();

    // SAFETY: callers are serialized with every other env-reading test.
    unsafe { std::env::set_var(var, value) };
    let result = load_and_validate_path(&path);
    unsafe { std::env::remove_var(var) };

    result.unwrap_or_else(|errors| panic!("{var} should load: {errors:?}"))
}

#[test]
#[serial_test::serial]
fn env_overrides_dashboard_section() {
    let config = load_with_env(
        "[dashboard]\nlog_level = \"info\"\n",
        "INGATIN_DASHBOARD_LOG_LEVEL",
        "trace",
    );
    assert_eq!(config.dashboard.log_level, "trace");
}

#[test]
#[serial_test::serial]
fn env_overrides_supabase_section() {
    let config = load_with_env(
        "[supabase]\nanon_key = \"from-file\"\n",
        "INGATIN_SUPABASE_ANON_KEY",
        "from-env",
    );
    assert_eq!(config.supabase.anon_key.as_deref(), Some("from-env"));
}

#[test]
#[serial_test::serial]
fn env_overrides_realtime_section() {
    let config = load_with_env(
        "[realtime]\nenabled = true\n",
        "INGATIN_REALTIME_ENABLED",
        "false",
    );
    assert!(!config.realtime.enabled);
}

#[test]
#[serial_test::serial]
fn env_overrides_bot_section() {
    let config = load_with_env(
        "[bot]\ngreeting = \"Halo\"\n",
        "INGATIN_BOT_GREETING",
        "Selamat pagi",
    );
    assert_eq!(config.bot.greeting.as_deref(), Some("Selamat pagi"));
}

#[test]
#[serial_test::serial]
fn env_overrides_session_section() {
    let config = load_with_env(
        "[session]\npersist = true\n",
        "INGATIN_SESSION_PERSIST",
        "false",
    );
    assert!(!config.session.persist);
}

#[test]
#[serial_test::serial]
fn env_unknown_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingatin.toml");
    std::fs::write(&path, "").unwrap();

    // SAFETY: serialized with every other env-reading test.
    unsafe { std::env::set_var("INGATIN_REALTIME_INBOX_CAPACTY", "3") };
    let result = load_and_validate_path(&path);
    unsafe { std::env::remove_var("INGATIN_REALTIME_INBOX_CAPACTY") };

    assert!(result.is_err());
}

#[test]
fn suggest_key_prefers_closest() {
    let valid = &["login_route", "home_route", "log_level"];
    assert_eq!(suggest_key("home_rout", valid), Some("home_route".into()));
}
