// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `users` table.
//!
//! `MemoryUserStore` behaves like the hosted row store closely enough for
//! end-to-end tests: ids and timestamps are assigned on insert, the list is
//! newest first, numbers are unique, and every write is announced on an
//! attached [`MockChangeFeed`]. Writes can be delayed or made to fail.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use ingatin_core::{
    AdapterType, ChangeEvent, ChangeKind, HealthStatus, IngatinError, NewUser, PluginAdapter,
    Shift, User, UserId, UserPatch, UserStore,
};
use tracing::debug;

use crate::mock_feed::MockChangeFeed;

/// A mock row store for testing.
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
    feed: Option<Arc<MockChangeFeed>>,
    fail_writes: Mutex<Option<String>>,
    write_delay: Mutex<Option<Duration>>,
    requests: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            feed: None,
            fail_writes: Mutex::new(None),
            write_delay: Mutex::new(None),
            requests: AtomicUsize::new(0),
        }
    }

    /// Announces every successful write on `feed`.
    pub fn with_feed(mut self, feed: Arc<MockChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Inserts rows directly, without change notifications.
    pub fn seed(&self, users: impl IntoIterator<Item = NewUser>) -> Vec<User> {
        let mut rows = self.rows();
        users
            .into_iter()
            .map(|new| {
                let user = build_user(&new, rows.len());
                rows.push(user.clone());
                user
            })
            .collect()
    }

    /// Every later write fails with `message` until cleared with `None`.
    pub fn fail_writes(&self, message: Option<&str>) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = message.map(str::to_string);
    }

    /// Writes wait `delay` before touching the table.
    pub fn delay_writes(&self, delay: Option<Duration>) {
        *self.write_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// Number of calls made through `UserStore`.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Current table contents, newest first.
    pub fn snapshot(&self) -> Vec<User> {
        newest_first(self.rows().clone())
    }

    fn rows(&self) -> MutexGuard<'_, Vec<User>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn before_write(&self) -> Result<(), IngatinError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.write_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self
            .fail_writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match failure {
            Some(message) => Err(IngatinError::remote(message)),
            None => Ok(()),
        }
    }

    fn announce(&self, kind: ChangeKind, record: Option<&User>, old: Option<&User>) {
        let Some(feed) = &self.feed else {
            return;
        };
        let delivered = feed.publish(ChangeEvent {
            schema: "public".into(),
            table: "users".into(),
            kind,
            record: record.and_then(|u| serde_json::to_value(u).ok()),
            old_record: old.and_then(|u| serde_json::to_value(u).ok()),
            commit_timestamp: Some(Utc::now()),
        });
        debug!(kind = %kind, delivered, "change announced");
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Later inserts get later `created_at`, so ordering is deterministic.
fn build_user(new: &NewUser, seq: usize) -> User {
    let created_at = Utc::now() + TimeDelta::milliseconds(seq as i64);
    User {
        id: UserId::from(uuid::Uuid::new_v4().to_string()),
        number: new.number.clone(),
        name: new.name.clone(),
        absen_pagi: new.absen_pagi,
        absen_sore: new.absen_sore,
        last_checkin: new.last_checkin,
        suspend_until: new.suspend_until,
        created_at,
        updated_at: created_at,
    }
}

fn newest_first(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    users
}

fn not_found(id: &UserId) -> IngatinError {
    IngatinError::NotFound {
        resource: "user".into(),
        id: id.to_string(),
    }
}

#[async_trait]
impl PluginAdapter for MemoryUserStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, IngatinError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list_users(&self) -> Result<Vec<User>, IngatinError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot())
    }

    async fn get_user(&self, id: &UserId) -> Result<User, IngatinError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.rows()
            .iter()
            .find(|u| u.id == *id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, IngatinError> {
        self.before_write().await?;
        let created = {
            let mut rows = self.rows();
            if rows.iter().any(|u| u.number == user.number) {
                return Err(IngatinError::remote(
                    "duplicate key value violates unique constraint \"users_number_key\"",
                ));
            }
            let created = build_user(user, rows.len());
            rows.push(created.clone());
            created
        };
        self.announce(ChangeKind::Insert, Some(&created), None);
        Ok(created)
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User, IngatinError> {
        self.before_write().await?;
        let (old, updated) = {
            let mut rows = self.rows();
            let row = rows.iter_mut().find(|u| u.id == *id).ok_or_else(|| not_found(id))?;
            let old = row.clone();
            patch.clone().with_updated_at(Utc::now()).apply_to(row);
            (old, row.clone())
        };
        self.announce(ChangeKind::Update, Some(&updated), Some(&old));
        Ok(updated)
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), IngatinError> {
        self.before_write().await?;
        let removed = {
            let mut rows = self.rows();
            let index = rows.iter().position(|u| u.id == *id);
            index.map(|i| rows.remove(i))
        };
        // Deleting a missing row is not an error for the row store.
        if let Some(old) = removed {
            self.announce(ChangeKind::Delete, None, Some(&old));
        }
        Ok(())
    }

    async fn reset_attendance(&self, shift: Shift) -> Result<(), IngatinError> {
        self.before_write().await?;
        let changed: Vec<(User, User)> = {
            let mut rows = self.rows();
            let patch = shift.patch(false).with_updated_at(Utc::now());
            rows.iter_mut()
                .filter(|u| shift.is_done(u))
                .map(|row| {
                    let old = row.clone();
                    patch.apply_to(row);
                    (old, row.clone())
                })
                .collect()
        };
        for (old, new) in &changed {
            self.announce(ChangeKind::Update, Some(new), Some(old));
        }
        Ok(())
    }
}
