// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the dashboard's data layer the way the binary's
//! composition root does, with mock adapters in place of the hosted backend:
//! session manager, query cache, user queries and mutations, and a realtime
//! bridge wired to the in-memory store's change feed.

use std::sync::Arc;

use ingatin_auth::{AuthGuard, SessionManager};
use ingatin_config::model::IngatinConfig;
use ingatin_core::{NewUser, User};
use ingatin_query::{
    InvalidationTable, QueryClient, QueryState, RealtimeBridge, RealtimeSubscription,
    UserMutations, UserQueries,
};

use crate::memory_store::MemoryUserStore;
use crate::mock_auth::MockAuth;
use crate::mock_feed::MockChangeFeed;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    users: Vec<NewUser>,
    signed_in: bool,
    pending_feed: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            users: Vec::new(),
            signed_in: true,
            pending_feed: false,
        }
    }

    /// Rows present in the table before the test starts.
    pub fn with_users(mut self, users: Vec<NewUser>) -> Self {
        self.users = users;
        self
    }

    /// Whether a stored session exists at startup. Defaults to `true`.
    pub fn signed_in(mut self, signed_in: bool) -> Self {
        self.signed_in = signed_in;
        self
    }

    /// Channels stay `Connecting` until the test moves them on.
    pub fn with_pending_feed(mut self) -> Self {
        self.pending_feed = true;
        self
    }

    /// Build the harness. Must run inside a Tokio runtime.
    pub async fn build(self) -> TestHarness {
        let config = IngatinConfig::default();

        let feed = Arc::new(if self.pending_feed {
            MockChangeFeed::pending()
        } else {
            MockChangeFeed::new()
        });
        let store = Arc::new(MemoryUserStore::new().with_feed(feed.clone()));
        let seeded = store.seed(self.users);
        let auth = Arc::new(if self.signed_in {
            MockAuth::signed_in()
        } else {
            MockAuth::new()
        });

        let session = SessionManager::init(auth.clone()).await;
        let client = QueryClient::new();
        let queries = UserQueries::new(client.clone(), store.clone());
        let mutations = UserMutations::new(client.clone(), store.clone());
        let bridge = RealtimeBridge::new(
            feed.clone(),
            Arc::new(client.clone()),
            config.realtime.inbox_capacity,
        );
        let guard = AuthGuard::from_config(&config.dashboard);

        TestHarness {
            store,
            feed,
            auth,
            session,
            client,
            queries,
            mutations,
            bridge,
            guard,
            config,
            seeded,
        }
    }
}

/// A complete test environment with mock adapters.
pub struct TestHarness {
    /// In-memory `users` table.
    pub store: Arc<MemoryUserStore>,
    /// Change feed the store announces writes on.
    pub feed: Arc<MockChangeFeed>,
    pub auth: Arc<MockAuth>,
    pub session: Arc<SessionManager>,
    pub client: QueryClient,
    pub queries: UserQueries,
    pub mutations: UserMutations,
    pub bridge: RealtimeBridge,
    pub guard: AuthGuard,
    pub config: IngatinConfig,
    /// Rows created by [`TestHarnessBuilder::with_users`], in seed order.
    pub seeded: Vec<User>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Opens the `users` invalidation channel, as the dashboard view does.
    pub fn subscribe_users(&self) -> RealtimeSubscription {
        let table = InvalidationTable::users(&self.config.supabase.users_table);
        let mut subs = self.bridge.subscribe_all(&table);
        subs.remove(0)
    }

    /// The user list, fetched only while signed in.
    pub async fn users(&self) -> QueryState<Vec<User>> {
        self.queries.users(self.session.is_authenticated()).await
    }
}
