// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composition root.
//!
//! Builds the dashboard's object graph once per process: adapters, then the
//! session provider, then the query cache and everything that reads or
//! writes through it.

use std::sync::Arc;

use chrono::FixedOffset;
use ingatin_auth::{AuthGuard, SessionManager};
use ingatin_config::IngatinConfig;
use ingatin_core::format::offset_hours;
use ingatin_core::{
    AdapterType, AuthProvider, ChangeFeed, HealthStatus, IngatinError, UserStore,
};
use ingatin_query::{
    InvalidationTable, QueryClient, RealtimeBridge, RealtimeSubscription, UserMutations,
    UserQueries,
};
use ingatin_supabase::SupabaseBackend;
use tracing::{debug, info};

/// The backend the dashboard talks to.
pub struct Adapters {
    pub store: Arc<dyn UserStore>,
    pub auth: Arc<dyn AuthProvider>,
    /// `None` when realtime is disabled.
    pub feed: Option<Arc<dyn ChangeFeed>>,
}

impl Adapters {
    /// The hosted Supabase project named in the configuration.
    pub fn supabase(config: &IngatinConfig) -> Result<Self, IngatinError> {
        let backend = SupabaseBackend::from_config(config)?;
        let feed: Option<Arc<dyn ChangeFeed>> = if config.realtime.enabled {
            Some(backend.realtime)
        } else {
            None
        };
        Ok(Self {
            store: backend.store,
            auth: backend.auth,
            feed,
        })
    }
}

/// Health of one adapter, for `ingatin status`.
#[derive(Debug)]
pub struct AdapterHealth {
    pub name: String,
    pub adapter_type: AdapterType,
    pub status: HealthStatus,
}

pub struct App {
    config: IngatinConfig,
    adapters: Adapters,
    session: Arc<SessionManager>,
    client: QueryClient,
    queries: UserQueries,
    mutations: UserMutations,
    bridge: Option<RealtimeBridge>,
}

impl App {
    /// Restores the session and wires the data layer over `adapters`.
    pub async fn start(config: IngatinConfig, adapters: Adapters) -> Self {
        let session = SessionManager::init(adapters.auth.clone()).await;
        let client = QueryClient::new();
        let queries = UserQueries::new(client.clone(), adapters.store.clone());
        let mutations = UserMutations::new(client.clone(), adapters.store.clone());
        let bridge = adapters.feed.clone().map(|feed| {
            RealtimeBridge::new(
                feed,
                Arc::new(client.clone()),
                config.realtime.inbox_capacity,
            )
        });
        info!(
            store = adapters.store.name(),
            realtime = bridge.is_some(),
            state = %session.state(),
            "dashboard started"
        );
        Self {
            config,
            adapters,
            session,
            client,
            queries,
            mutations,
            bridge,
        }
    }

    /// [`start`](Self::start) over the configured Supabase project.
    pub async fn connect(config: IngatinConfig) -> Result<Self, IngatinError> {
        let adapters = Adapters::supabase(&config)?;
        Ok(Self::start(config, adapters).await)
    }

    pub fn config(&self) -> &IngatinConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn queries(&self) -> &UserQueries {
        &self.queries
    }

    pub fn mutations(&self) -> &UserMutations {
        &self.mutations
    }

    /// A fresh guard using the configured routes.
    pub fn guard(&self) -> AuthGuard {
        AuthGuard::from_config(&self.config.dashboard)
    }

    /// Display zone for timestamps.
    pub fn offset(&self) -> FixedOffset {
        offset_hours(self.config.dashboard.utc_offset_hours)
    }

    /// Opens the `users` invalidation channel. `None` when realtime is off.
    pub fn subscribe_users(&self) -> Option<RealtimeSubscription> {
        let bridge = self.bridge.as_ref()?;
        let table = InvalidationTable::users(&self.config.supabase.users_table);
        bridge.subscribe_all(&table).into_iter().next()
    }

    /// Fails unless a session exists; commands behind the guard call this first.
    pub fn require_session(&self) -> Result<(), IngatinError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(IngatinError::auth("not signed in, run `ingatin login` first"))
        }
    }

    /// Health of every adapter in use.
    pub async fn health(&self) -> Vec<AdapterHealth> {
        let mut results = Vec::new();
        results.push(check(self.adapters.store.as_ref()).await);
        results.push(check(self.adapters.auth.as_ref()).await);
        if let Some(feed) = &self.adapters.feed {
            results.push(check(feed.as_ref()).await);
        }
        results
    }

    /// Stops background tasks owned by the session provider.
    pub fn shutdown(&self) {
        debug!("shutting down");
        self.session.shutdown();
    }
}

async fn check<A>(adapter: &A) -> AdapterHealth
where
    A: ingatin_core::PluginAdapter + ?Sized,
{
    let status = match adapter.health_check().await {
        Ok(status) => status,
        Err(e) => HealthStatus::Unhealthy(e.to_string()),
    };
    AdapterHealth {
        name: adapter.name().to_string(),
        adapter_type: adapter.adapter_type(),
        status,
    }
}
