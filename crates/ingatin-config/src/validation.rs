// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: URL schemes, route
//! shapes, positive timeouts, and the bot number format.

use crate::diagnostic::ConfigError;
use crate::model::IngatinConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &IngatinConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if let Some(url) = config.supabase.url.as_deref() {
        let url = url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            fail(format!(
                "supabase.url `{url}` must start with http:// or https://"
            ));
        }
        if config
            .supabase
            .anon_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            fail("supabase.anon_key must not be empty when set".to_string());
        }
    }

    if config.supabase.users_table.trim().is_empty() {
        fail("supabase.users_table must not be empty".to_string());
    }

    if config.supabase.schema.trim().is_empty() {
        fail("supabase.schema must not be empty".to_string());
    }

    if config.supabase.request_timeout_secs == 0 {
        fail("supabase.request_timeout_secs must be at least 1".to_string());
    }

    if config.realtime.heartbeat_secs == 0 {
        fail("realtime.heartbeat_secs must be at least 1".to_string());
    }

    if config.realtime.join_timeout_secs == 0 {
        fail("realtime.join_timeout_secs must be at least 1".to_string());
    }

    if config.realtime.inbox_capacity == 0 {
        fail("realtime.inbox_capacity must be at least 1".to_string());
    }

    for (name, route) in [
        ("dashboard.login_route", &config.dashboard.login_route),
        ("dashboard.home_route", &config.dashboard.home_route),
    ] {
        if !route.starts_with('/') {
            fail(format!("{name} `{route}` must start with `/`"));
        }
    }

    for (i, prefix) in config.dashboard.protected_prefixes.iter().enumerate() {
        if !prefix.starts_with('/') {
            fail(format!(
                "dashboard.protected_prefixes[{i}] `{prefix}` must start with `/`"
            ));
        }
    }

    if config
        .dashboard
        .protected_prefixes
        .iter()
        .any(|p| config.dashboard.login_route.starts_with(p.as_str()))
    {
        fail(format!(
            "dashboard.login_route `{}` must not be a protected route",
            config.dashboard.login_route
        ));
    }

    if !(-12..=14).contains(&config.dashboard.utc_offset_hours) {
        fail(format!(
            "dashboard.utc_offset_hours must be between -12 and 14, got {}",
            config.dashboard.utc_offset_hours
        ));
    }

    if let Some(number) = config.bot.whatsapp_number.as_deref()
        && (number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()))
    {
        fail(format!(
            "bot.whatsapp_number `{number}` must contain digits only"
        ));
    }

    if config.session.persist && config.session.path.trim().is_empty() {
        fail("session.path must not be empty when session.persist is on".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
