// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Ingat-In dashboard.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level dashboard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngatinConfig {
    /// View layer, routing, and logging settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Hosted backend (Supabase) settings.
    #[serde(default)]
    pub supabase: SupabaseConfig,

    /// Realtime change-notification settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// WhatsApp bot call-to-action settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Session persistence settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// View layer and routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Offset from UTC, in hours, used to render timestamps (WIB = 7).
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Route prefixes that require a session.
    #[serde(default = "default_protected_prefixes")]
    pub protected_prefixes: Vec<String>,

    /// Route unauthenticated visitors are sent to.
    #[serde(default = "default_login_route")]
    pub login_route: String,

    /// Route authenticated visitors land on after login.
    #[serde(default = "default_home_route")]
    pub home_route: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            utc_offset_hours: default_utc_offset_hours(),
            protected_prefixes: default_protected_prefixes(),
            login_route: default_login_route(),
            home_route: default_home_route(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_utc_offset_hours() -> i32 {
    7
}

fn default_protected_prefixes() -> Vec<String> {
    vec!["/dashboard".to_string(), "/users".to_string()]
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_home_route() -> String {
    "/dashboard".to_string()
}

/// Hosted backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`. `None` until configured.
    #[serde(default)]
    pub url: Option<String>,

    /// Public anon key sent as `apikey`. `None` requires the env var.
    #[serde(default)]
    pub anon_key: Option<String>,

    /// Database schema holding the attendance table.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Name of the attendance table.
    #[serde(default = "default_users_table")]
    pub users_table: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            schema: default_schema(),
            users_table: default_users_table(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_users_table() -> String {
    "users".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Realtime channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Subscribe to change notifications. When off, lists only refresh on mutations.
    #[serde(default = "default_realtime_enabled")]
    pub enabled: bool,

    /// Interval between socket heartbeats.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// How long to wait for the join reply before reporting `TIMED_OUT`.
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,

    /// Capacity of the bounded change-event inbox per subscription.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_realtime_enabled(),
            heartbeat_secs: default_heartbeat_secs(),
            join_timeout_secs: default_join_timeout_secs(),
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

fn default_realtime_enabled() -> bool {
    true
}

fn default_heartbeat_secs() -> u64 {
    25
}

fn default_join_timeout_secs() -> u64 {
    10
}

fn default_inbox_capacity() -> usize {
    64
}

/// WhatsApp bot call-to-action configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Bot number in local form (`08…`). `None` hides the call to action.
    #[serde(default)]
    pub whatsapp_number: Option<String>,

    /// Message pre-filled in the chat opened by the landing link.
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            whatsapp_number: None,
            greeting: default_greeting(),
        }
    }
}

fn default_greeting() -> Option<String> {
    Some("Halo".to_string())
}

/// Session persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Keep the session on disk so the next run restores it.
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Session file location.
    #[serde(default = "default_session_path")]
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist: default_persist(),
            path: default_session_path(),
        }
    }
}

fn default_persist() -> bool {
    true
}

fn default_session_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("ingatin").join("session.json"))
        .unwrap_or_else(|| std::path::PathBuf::from("ingatin-session.json"))
        .to_string_lossy()
        .into_owned()
}
