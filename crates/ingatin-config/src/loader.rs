// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ingatin.toml` > `~/.config/ingatin/ingatin.toml` > `/etc/ingatin/ingatin.toml`
//! with environment variable overrides via `INGATIN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::diagnostic::ENV_PREFIX;
use crate::model::IngatinConfig;

pub(crate) const LOCAL_CONFIG_FILE: &str = "ingatin.toml";
pub(crate) const SYSTEM_CONFIG_FILE: &str = "/etc/ingatin/ingatin.toml";

/// Config sections that `INGATIN_<SECTION>_<KEY>` variables map into.
const ENV_SECTIONS: [&str; 5] = ["dashboard", "supabase", "realtime", "bot", "session"];

/// `~/.config/ingatin/ingatin.toml`, if a config dir exists on this platform.
pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ingatin").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ingatin/ingatin.toml` (system-wide)
/// 3. `~/.config/ingatin/ingatin.toml` (user XDG config)
/// 4. `./ingatin.toml` (local directory)
/// 5. `INGATIN_*` environment variables
pub fn load_config() -> Result<IngatinConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<IngatinConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(IngatinConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<IngatinConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(IngatinConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(IngatinConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_FILE))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `INGATIN_SUPABASE_ANON_KEY` must map to `supabase.anon_key`,
/// not `supabase.anon.key`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("supabase_anon_key"), "supabase.anon_key");
        assert_eq!(map_env_key("bot_whatsapp_number"), "bot.whatsapp_number");
        assert_eq!(
            map_env_key("realtime_join_timeout_secs"),
            "realtime.join_timeout_secs"
        );
        assert_eq!(map_env_key("dashboard_log_level"), "dashboard.log_level");
    }

    #[test]
    fn unknown_env_keys_pass_through() {
        assert_eq!(map_env_key("botanical"), "botanical");
        assert_eq!(map_env_key("other"), "other");
    }
}
