// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supabase backend adapters for the Ingat-In dashboard.
//!
//! - [`SupabaseUserStore`]: the `users` table over PostgREST.
//! - [`SupabaseAuth`]: password sign-in, session restore and refresh over GoTrue.
//! - [`SupabaseRealtime`]: row-level change notifications over the Realtime socket.
//!
//! All three share one [`SupabaseClient`], so the access token installed by
//! a sign-in authorizes every later request and channel join.

pub mod auth;
pub mod client;
pub mod protocol;
pub mod realtime;
pub mod rest;

use std::sync::Arc;

pub use auth::{SessionFile, SupabaseAuth};
pub use client::SupabaseClient;
pub use realtime::SupabaseRealtime;
pub use rest::SupabaseUserStore;

use ingatin_config::IngatinConfig;
use ingatin_core::IngatinError;

/// The three adapters wired to one project.
pub struct SupabaseBackend {
    pub client: SupabaseClient,
    pub store: Arc<SupabaseUserStore>,
    pub auth: Arc<SupabaseAuth>,
    pub realtime: Arc<SupabaseRealtime>,
}

impl SupabaseBackend {
    /// Builds every adapter from the loaded configuration.
    pub fn from_config(config: &IngatinConfig) -> Result<Self, IngatinError> {
        let client = SupabaseClient::from_config(&config.supabase)?;
        let file = config
            .session
            .persist
            .then(|| SessionFile::new(&config.session.path));
        Ok(Self {
            store: Arc::new(SupabaseUserStore::new(
                client.clone(),
                config.supabase.users_table.clone(),
            )),
            auth: SupabaseAuth::new(client.clone(), file),
            realtime: Arc::new(SupabaseRealtime::from_config(
                client.clone(),
                &config.realtime,
            )),
            client,
        })
    }
}

#[cfg(test)]
mod tests {
    use ingatin_core::{AdapterType, PluginAdapter};

    use super::*;

    #[test]
    fn backend_requires_project_url() {
        let config = IngatinConfig::default();
        assert!(matches!(
            SupabaseBackend::from_config(&config),
            Err(IngatinError::Config(_))
        ));
    }

    #[test]
    fn backend_wires_all_adapters() {
        let mut config = IngatinConfig::default();
        config.supabase.url = Some("https://abcd.supabase.co".into());
        config.supabase.anon_key = Some("anon".into());
        config.session.persist = false;

        let backend = SupabaseBackend::from_config(&config).unwrap();
        assert_eq!(backend.store.adapter_type(), AdapterType::Store);
        assert_eq!(backend.auth.adapter_type(), AdapterType::Auth);
        assert_eq!(backend.realtime.adapter_type(), AdapterType::Realtime);
        assert_eq!(backend.client.base_url(), "https://abcd.supabase.co");
    }
}
