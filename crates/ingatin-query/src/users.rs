// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cached queries and optimistic mutations over the `users` table.

use std::sync::Arc;

use ingatin_core::{IngatinError, NewUser, Shift, User, UserId, UserPatch, UserStore};
use tracing::info;

use crate::client::{QueryClient, QueryObserver, QueryOptions, QueryState};
use crate::key::user_keys;
use crate::mutation::run_mutation;

/// Options every user query uses: fresh until a realtime change invalidates it.
fn options(enabled: bool) -> QueryOptions {
    QueryOptions::infinite().enabled(enabled)
}

/// Read side: the user list and single users, served from the cache.
#[derive(Clone)]
pub struct UserQueries {
    client: QueryClient,
    store: Arc<dyn UserStore>,
}

impl UserQueries {
    pub fn new(client: QueryClient, store: Arc<dyn UserStore>) -> Self {
        Self { client, store }
    }

    /// All users, newest first. `enabled` gates fetching on the auth state.
    pub async fn users(&self, enabled: bool) -> QueryState<Vec<User>> {
        let store = self.store.clone();
        self.client
            .fetch_query(user_keys::all(), options(enabled), move || {
                let store = store.clone();
                async move { store.list_users().await }
            })
            .await
    }

    /// One user. An empty id never fetches.
    pub async fn user(&self, id: &UserId, enabled: bool) -> QueryState<User> {
        let store = self.store.clone();
        let fetch_id = id.clone();
        self.client
            .fetch_query(
                user_keys::detail(id),
                options(enabled && !id.as_str().is_empty()),
                move || {
                    let store = store.clone();
                    let id = fetch_id.clone();
                    async move { store.get_user(&id).await }
                },
            )
            .await
    }

    /// Live view of the user list.
    pub fn observe_users(&self, enabled: bool) -> QueryObserver<Vec<User>> {
        let store = self.store.clone();
        self.client
            .observe(user_keys::all(), options(enabled), move || {
                let store = store.clone();
                async move { store.list_users().await }
            })
    }

    /// Live view of one user.
    pub fn observe_user(&self, id: &UserId, enabled: bool) -> QueryObserver<User> {
        let store = self.store.clone();
        let fetch_id = id.clone();
        self.client.observe(
            user_keys::detail(id),
            options(enabled && !id.as_str().is_empty()),
            move || {
                let store = store.clone();
                let id = fetch_id.clone();
                async move { store.get_user(&id).await }
            },
        )
    }
}

/// Write side: every mutation reconciles the cached user queries.
#[derive(Clone)]
pub struct UserMutations {
    client: QueryClient,
    store: Arc<dyn UserStore>,
}

impl UserMutations {
    pub fn new(client: QueryClient, store: Arc<dyn UserStore>) -> Self {
        Self { client, store }
    }

    /// Merges `patch` into the cached detail and list entries, then writes it.
    ///
    /// Both entries are snapshotted; settling invalidates the `users` prefix
    /// once, which covers the detail.
    pub async fn update_user(&self, id: &UserId, patch: UserPatch) -> Result<User, IngatinError> {
        let detail = user_keys::detail(id);
        let list = user_keys::all();
        run_mutation(
            &self.client,
            vec![detail.clone(), list.clone()],
            |tx| {
                tx.apply::<User, _>(&detail, |user| {
                    let mut user = user.clone();
                    patch.apply_to(&mut user);
                    user
                });
                tx.apply::<Vec<User>, _>(&list, |users| {
                    users
                        .iter()
                        .map(|user| {
                            let mut user = user.clone();
                            if user.id == *id {
                                patch.apply_to(&mut user);
                            }
                            user
                        })
                        .collect()
                });
            },
            || self.store.update_user(id, &patch),
        )
        .await
    }

    /// Flips one attendance flag of `user`.
    pub async fn toggle_attendance(&self, user: &User, shift: Shift) -> Result<User, IngatinError> {
        let done = !shift.is_done(user);
        info!(id = %user.id, shift = %shift, done, "toggling attendance");
        self.update_user(&user.id, shift.patch(done)).await
    }

    /// Removes the user from the cached list, then deletes it.
    pub async fn delete_user(&self, id: &UserId) -> Result<(), IngatinError> {
        let list = user_keys::all();
        run_mutation(
            &self.client,
            vec![list.clone()],
            |tx| {
                tx.apply::<Vec<User>, _>(&list, |users| {
                    users.iter().filter(|u| u.id != *id).cloned().collect()
                });
            },
            || self.store.delete_user(id),
        )
        .await
    }

    /// Inserts a user. The list refreshes through invalidation only.
    pub async fn create_user(&self, user: &NewUser) -> Result<User, IngatinError> {
        run_mutation(
            &self.client,
            vec![user_keys::all()],
            |_| {},
            || self.store.create_user(user),
        )
        .await
    }

    /// Clears one attendance flag on every user.
    pub async fn reset_attendance(&self, shift: Shift) -> Result<(), IngatinError> {
        run_mutation(
            &self.client,
            vec![user_keys::all()],
            |_| {},
            || self.store.reset_attendance(shift),
        )
        .await
    }

    pub async fn reset_morning_attendance(&self) -> Result<(), IngatinError> {
        self.reset_attendance(Shift::Morning).await
    }

    pub async fn reset_evening_attendance(&self) -> Result<(), IngatinError> {
        self.reset_attendance(Shift::Evening).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use ingatin_core::{AdapterType, HealthStatus, PluginAdapter};
    use tokio::sync::Notify;

    use super::*;

    /// Store whose writes block until released, so tests can look at the
    /// cache while a request is outstanding.
    struct GatedStore {
        users: Mutex<Vec<User>>,
        fail_writes: bool,
        gate: Notify,
        detail_fetches: AtomicUsize,
    }

    impl GatedStore {
        fn new(users: Vec<User>, fail_writes: bool) -> Arc<Self> {
            Arc::new(Self {
                users: Mutex::new(users),
                fail_writes,
                gate: Notify::new(),
                detail_fetches: AtomicUsize::new(0),
            })
        }

        async fn write<R>(&self, f: impl FnOnce(&mut Vec<User>) -> R) -> Result<R, IngatinError> {
            self.gate.notified().await;
            if self.fail_writes {
                return Err(IngatinError::remote("new row violates row-level security policy"));
            }
            Ok(f(&mut self.users.lock().unwrap()))
        }
    }

    #[async_trait]
    impl PluginAdapter for GatedStore {
        fn name(&self) -> &str {
            "gated"
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Store
        }
        async fn health_check(&self) -> Result<HealthStatus, IngatinError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl UserStore for GatedStore {
        async fn list_users(&self) -> Result<Vec<User>, IngatinError> {
            Ok(self.users.lock().unwrap().clone())
        }
        async fn get_user(&self, id: &UserId) -> Result<User, IngatinError> {
            self.detail_fetches.fetch_add(1, Ordering::SeqCst);
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == *id)
                .cloned()
                .ok_or_else(|| IngatinError::NotFound {
                    resource: "user".into(),
                    id: id.to_string(),
                })
        }
        async fn create_user(&self, _user: &NewUser) -> Result<User, IngatinError> {
            Err(IngatinError::Internal("not used".into()))
        }
        async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User, IngatinError> {
            let id = id.clone();
            let patch = patch.clone();
            self.write(move |users| {
                let user = users.iter_mut().find(|u| u.id == id).unwrap();
                patch.apply_to(user);
                user.clone()
            })
            .await
        }
        async fn delete_user(&self, id: &UserId) -> Result<(), IngatinError> {
            let id = id.clone();
            self.write(move |users| users.retain(|u| u.id != id)).await
        }
        async fn reset_attendance(&self, shift: Shift) -> Result<(), IngatinError> {
            self.write(move |users| {
                for u in users.iter_mut() {
                    shift.patch(false).apply_to(u);
                }
            })
            .await
        }
    }

    fn user(id: &str, pagi: bool) -> User {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap();
        User {
            id: UserId::from(id),
            number: format!("62812000{id}@s.whatsapp.net"),
            name: Some(format!("User {id}")),
            absen_pagi: pagi,
            absen_sore: false,
            last_checkin: None,
            suspend_until: None,
            created_at: at,
            updated_at: at,
        }
    }

    async fn primed(store: Arc<GatedStore>) -> (QueryClient, UserQueries, UserMutations) {
        let client = QueryClient::new();
        let queries = UserQueries::new(client.clone(), store.clone());
        let mutations = UserMutations::new(client.clone(), store);
        queries.users(true).await;
        queries.user(&UserId::from("1"), true).await;
        (client, queries, mutations)
    }

    #[tokio::test]
    async fn optimistic_update_is_visible_before_the_response() {
        let store = GatedStore::new(vec![user("1", false), user("2", false)], false);
        let (client, _queries, mutations) = primed(store.clone()).await;

        let pending = tokio::spawn({
            let mutations = mutations.clone();
            async move {
                mutations
                    .update_user(&UserId::from("1"), UserPatch::morning(true))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let list = client.get_data::<Vec<User>>(&user_keys::all()).unwrap();
        assert!(list.iter().find(|u| u.id.as_str() == "1").unwrap().absen_pagi);
        assert!(!list.iter().find(|u| u.id.as_str() == "2").unwrap().absen_pagi);
        let detail = client.get_data::<User>(&user_keys::detail(&UserId::from("1"))).unwrap();
        assert!(detail.absen_pagi);

        store.gate.notify_one();
        let updated = pending.await.unwrap().unwrap();
        assert!(updated.absen_pagi);
    }

    #[tokio::test]
    async fn failed_update_restores_previous_values() {
        let store = GatedStore::new(vec![user("1", false), user("2", true)], true);
        let (client, _queries, mutations) = primed(store.clone()).await;
        let before_list = client.get_data::<Vec<User>>(&user_keys::all()).unwrap();
        let before_detail = client
            .get_data::<User>(&user_keys::detail(&UserId::from("1")))
            .unwrap();

        store.gate.notify_one();
        let err = mutations
            .update_user(&UserId::from("1"), UserPatch::rename(Some("Baru".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, IngatinError::Remote { .. }));

        assert_eq!(client.get_data::<Vec<User>>(&user_keys::all()), Some(before_list));
        assert_eq!(
            client.get_data::<User>(&user_keys::detail(&UserId::from("1"))),
            Some(before_detail)
        );
    }

    #[tokio::test]
    async fn update_refetches_observed_detail_once() {
        let store = GatedStore::new(vec![user("1", false)], false);
        let (_client, queries, mutations) = primed(store.clone()).await;
        let id = UserId::from("1");
        let observer = queries.observe_user(&id, true);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let before = store.detail_fetches.load(Ordering::SeqCst);

        store.gate.notify_one();
        mutations
            .update_user(&id, UserPatch::morning(true))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.detail_fetches.load(Ordering::SeqCst) - before, 1);
        drop(observer);
    }

    #[tokio::test]
    async fn optimistic_delete_removes_the_id() {
        let store = GatedStore::new(vec![user("1", false), user("2", false)], false);
        let (client, _queries, mutations) = primed(store.clone()).await;

        let pending = tokio::spawn({
            let mutations = mutations.clone();
            async move { mutations.delete_user(&UserId::from("2")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let list = client.get_data::<Vec<User>>(&user_keys::all()).unwrap();
        assert!(list.iter().all(|u| u.id.as_str() != "2"));
        assert_eq!(list.len(), 1);

        store.gate.notify_one();
        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn toggle_flips_the_current_flag() {
        let store = GatedStore::new(vec![user("1", true)], false);
        let (_client, queries, mutations) = primed(store.clone()).await;
        let current = queries.user(&UserId::from("1"), true).await.data.unwrap();

        store.gate.notify_one();
        let updated = mutations
            .toggle_attendance(&current, Shift::Morning)
            .await
            .unwrap();
        assert!(!updated.absen_pagi);
    }

    #[tokio::test]
    async fn reset_invalidates_user_queries() {
        let store = GatedStore::new(vec![user("1", true)], false);
        let (client, _queries, mutations) = primed(store.clone()).await;

        store.gate.notify_one();
        mutations.reset_morning_attendance().await.unwrap();
        assert!(client.is_invalidated(&user_keys::all()));
        assert!(client.is_invalidated(&user_keys::detail(&UserId::from("1"))));
    }

    #[tokio::test]
    async fn queries_are_gated_by_enabled() {
        let store = GatedStore::new(vec![user("1", true)], false);
        let client = QueryClient::new();
        let queries = UserQueries::new(client.clone(), store);

        assert!(queries.users(false).await.data.is_none());
        assert!(queries.user(&UserId::from(""), true).await.data.is_none());
        assert_eq!(queries.users(true).await.data.map(|u| u.len()), Some(1));
    }
}
