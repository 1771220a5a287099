// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic cache transaction.
//!
//! ```text
//! begin(keys)   cancel in-flight fetches, snapshot every key
//! apply(..)     rewrite cached values locally
//! <request>
//! rollback()    on failure: put every snapshot back
//! settle()      always: invalidate every key, once per covering prefix
//! ```

use tracing::{debug, warn};

use crate::client::{AnyValue, QueryClient};
use crate::key::QueryKey;

/// One optimistic mutation's view of the cache.
///
/// Dropping an unsettled transaction settles it, so the touched keys are
/// always reconciled with the server even if the mutation future is dropped.
pub struct OptimisticTransaction {
    client: QueryClient,
    snapshots: Vec<(QueryKey, Option<AnyValue>)>,
    settled: bool,
}

impl OptimisticTransaction {
    /// Cancels in-flight fetches for `keys` and snapshots their cached values.
    pub fn begin<I>(client: &QueryClient, keys: I) -> Self
    where
        I: IntoIterator<Item = QueryKey>,
    {
        let mut snapshots: Vec<(QueryKey, Option<AnyValue>)> = Vec::new();
        for key in keys {
            if snapshots.iter().any(|(k, _)| *k == key) {
                continue;
            }
            client.cancel(&key);
            let snapshot = client.snapshot(&key);
            snapshots.push((key, snapshot));
        }
        Self {
            client: client.clone(),
            snapshots,
            settled: false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.snapshots.iter().map(|(k, _)| k)
    }

    /// Rewrites the cached value of `key` with `transform`.
    ///
    /// Only keys snapshotted by [`begin`](Self::begin) may be touched, so
    /// every change stays reversible. Returns `false` when nothing of type `T`
    /// is cached under `key` (the cache is then left as is).
    pub fn apply<T, F>(&self, key: &QueryKey, transform: F) -> bool
    where
        T: Send + Sync + 'static,
        F: FnOnce(&T) -> T,
    {
        if !self.snapshots.iter().any(|(k, _)| k == key) {
            warn!(key = %key, "optimistic update outside the transaction ignored");
            return false;
        }
        self.client.update_data(key, transform)
    }

    /// Restores every snapshot. A key that had no data goes back to having none.
    pub fn rollback(&mut self) {
        for (key, snapshot) in &self.snapshots {
            debug!(key = %key, "rolling back optimistic update");
            self.client.restore(key, snapshot.clone());
        }
    }

    /// Invalidates every key of the transaction.
    ///
    /// A key nested under another key of the transaction is reached through
    /// that prefix, so each cache entry is invalidated exactly once.
    pub fn settle(mut self) {
        self.invalidate_all();
    }

    fn invalidate_all(&mut self) {
        if self.settled {
            return;
        }
        self.settled = true;
        for (key, _) in &self.snapshots {
            let covered = self
                .snapshots
                .iter()
                .any(|(other, _)| other != key && key.starts_with(other));
            if !covered {
                self.client.invalidate(key);
            }
        }
    }
}

impl Drop for OptimisticTransaction {
    fn drop(&mut self) {
        self.invalidate_all();
    }
}
