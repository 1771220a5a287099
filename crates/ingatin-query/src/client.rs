// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide query cache.
//!
//! [`QueryClient`] maps [`QueryKey`]s to cache entries. Each entry keeps the
//! last fetched value, when it was fetched, whether it has been invalidated,
//! the last error, how many enabled observers watch it, and the fetch
//! currently in flight. Duplicate callers share that in-flight fetch, so a
//! key is never fetched twice concurrently.
//!
//! The entry map sits behind a `std::sync::Mutex` that is never held across
//! an `.await`: fetches run outside the lock and their results are applied
//! in one short critical section.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use ingatin_core::IngatinError;
use tokio::sync::watch;
use tracing::debug;

use crate::key::QueryKey;

/// Type-erased cached value.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

type FetchResult = Result<AnyValue, Arc<IngatinError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, IngatinError>> + Send + Sync>;

/// How long a fetched value is served without refetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleTime {
    Duration(Duration),
    /// Fresh until explicitly invalidated.
    Infinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub stale_time: StaleTime,
    /// When `false` the query never fetches and only reports cached data.
    pub enabled: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: StaleTime::Duration(Duration::ZERO),
            enabled: true,
        }
    }
}

impl QueryOptions {
    /// Options for queries kept fresh by realtime invalidation.
    pub fn infinite() -> Self {
        Self {
            stale_time: StaleTime::Infinite,
            enabled: true,
        }
    }

    pub fn with_stale_time(mut self, stale_time: StaleTime) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// What a view renders for one query.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<T>,
    /// Fetching with nothing cached yet.
    pub is_loading: bool,
    /// Any fetch in flight, including background refetches.
    pub is_fetching: bool,
    pub error: Option<Arc<IngatinError>>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_fetching: false,
            error: None,
        }
    }
}

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

struct Entry {
    data: Option<AnyValue>,
    updated_at: Option<Instant>,
    invalidated: bool,
    error: Option<Arc<IngatinError>>,
    observers: usize,
    in_flight: Option<InFlight>,
    fetcher: Option<Fetcher>,
    version: watch::Sender<u64>,
}

impl Entry {
    fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            data: None,
            updated_at: None,
            invalidated: false,
            error: None,
            observers: 0,
            in_flight: None,
            fetcher: None,
            version,
        }
    }

    fn is_fresh(&self, stale_time: StaleTime) -> bool {
        if self.data.is_none() || self.invalidated {
            return false;
        }
        match stale_time {
            StaleTime::Infinite => true,
            StaleTime::Duration(max_age) => self
                .updated_at
                .is_some_and(|at| at.elapsed() < max_age),
        }
    }

    /// Wakes every observer of this entry.
    fn touch(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn set(&mut self, data: Option<AnyValue>) {
        self.updated_at = data.as_ref().map(|_| Instant::now());
        self.data = data;
        self.invalidated = false;
        self.error = None;
        self.touch();
    }

    fn state<T: Clone + 'static>(&self) -> QueryState<T> {
        let data = self
            .data
            .as_ref()
            .and_then(|d| d.downcast_ref::<T>())
            .cloned();
        let is_fetching = self.in_flight.is_some();
        QueryState {
            is_loading: is_fetching && data.is_none(),
            is_fetching,
            data,
            error: self.error.clone(),
        }
    }
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    fetch_seq: AtomicU64,
}

/// Shared handle to the query cache. Cloning is cheap.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.entries().len())
            .finish()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                fetch_seq: AtomicU64::new(0),
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached value if fresh, otherwise fetches (or joins the
    /// fetch already in flight) and returns the resulting state.
    ///
    /// Errors are reported in [`QueryState::error`], never returned.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> QueryState<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, IngatinError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let pending = {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.fetcher = Some(fetcher.clone());
            if !options.enabled || entry.is_fresh(options.stale_time) {
                return entry.state();
            }
            self.start_fetch(&key, entry, fetcher)
        };
        self.settle_fetch(&key, pending).await;
        self.state(&key)
    }

    /// Registers an observer on `key` and starts the initial fetch if needed.
    ///
    /// The fetch runs on the current Tokio runtime; call this from inside one.
    pub fn observe<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> QueryObserver<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, IngatinError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let (changes, pending) = {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.fetcher = Some(fetcher.clone());
            let pending = if options.enabled {
                entry.observers += 1;
                (!entry.is_fresh(options.stale_time))
                    .then(|| self.start_fetch(&key, entry, fetcher))
            } else {
                None
            };
            (entry.version.subscribe(), pending)
        };
        if let Some(pending) = pending {
            self.spawn_settle(key.clone(), pending);
        }
        QueryObserver {
            client: self.clone(),
            key,
            options,
            changes,
            _marker: PhantomData,
        }
    }

    /// Current state of `key` without fetching.
    pub fn state<T: Clone + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        self.entries()
            .get(key)
            .map(Entry::state)
            .unwrap_or_default()
    }

    /// Cached value of `key`, if any and of type `T`.
    pub fn get_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.entries()
            .get(key)
            .and_then(|e| e.data.as_ref())
            .and_then(|d| d.downcast_ref::<T>())
            .cloned()
    }

    /// Replaces the cached value of `key`, creating the entry if needed.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        self.restore(&key, Some(Arc::new(value)));
    }

    /// Rewrites the cached value of `key` in place. Returns `false` if
    /// nothing of type `T` is cached.
    ///
    /// `transform` runs under the cache lock and must not call back into the client.
    pub fn update_data<T, F>(&self, key: &QueryKey, transform: F) -> bool
    where
        T: Send + Sync + 'static,
        F: FnOnce(&T) -> T,
    {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        let Some(current) = entry.data.as_ref().and_then(|d| d.downcast_ref::<T>()) else {
            return false;
        };
        let next: AnyValue = Arc::new(transform(current));
        entry.set(Some(next));
        true
    }

    /// Drops the cached value of `key`, keeping its observers.
    pub fn remove_data(&self, key: &QueryKey) {
        self.restore(key, None);
    }

    /// The cached value exactly as stored, for later [`restore`](Self::restore).
    pub fn snapshot(&self, key: &QueryKey) -> Option<AnyValue> {
        self.entries().get(key).and_then(|e| e.data.clone())
    }

    /// Puts back a value taken with [`snapshot`](Self::snapshot). `None` means "no data".
    pub fn restore(&self, key: &QueryKey, value: Option<AnyValue>) {
        let mut entries = self.entries();
        match entries.get_mut(key) {
            Some(entry) => entry.set(value),
            None if value.is_some() => {
                let mut entry = Entry::new();
                entry.set(value);
                entries.insert(key.clone(), entry);
            }
            None => {}
        }
    }

    /// Marks every entry under `prefix` stale and refetches the ones with
    /// enabled observers in the background. Returns the number of entries matched.
    ///
    /// A fetch already in flight for a refetched entry is superseded: it may
    /// have started before the change that caused this invalidation.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut refetches = Vec::new();
        let mut matched = 0;
        {
            let mut entries = self.entries();
            for (key, entry) in entries.iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
                matched += 1;
                entry.invalidated = true;
                if entry.observers > 0
                    && let Some(fetcher) = entry.fetcher.clone()
                {
                    entry.in_flight = None;
                    refetches.push((key.clone(), self.start_fetch(key, entry, fetcher)));
                }
                entry.touch();
            }
        }
        debug!(key = %prefix, matched, refetching = refetches.len(), "invalidated");
        for (key, pending) in refetches {
            self.spawn_settle(key, pending);
        }
        matched
    }

    /// Detaches in-flight fetches under `prefix`; their results are discarded.
    /// Returns the number of fetches cancelled.
    pub fn cancel(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let mut cancelled = 0;
        for (key, entry) in entries.iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
            if entry.in_flight.take().is_some() {
                cancelled += 1;
                debug!(key = %key, "fetch cancelled");
                entry.touch();
            }
        }
        cancelled
    }

    /// Fetches `key` now with its last registered fetcher, ignoring freshness.
    pub async fn refetch(&self, key: &QueryKey) {
        let pending = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            let Some(fetcher) = entry.fetcher.clone() else {
                return;
            };
            self.start_fetch(key, entry, fetcher)
        };
        self.settle_fetch(key, pending).await;
    }

    /// Number of enabled observers on `key`.
    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.entries().get(key).map_or(0, |e| e.observers)
    }

    /// `true` if `key` has been invalidated and not refetched since.
    pub fn is_invalidated(&self, key: &QueryKey) -> bool {
        self.entries().get(key).is_some_and(|e| e.invalidated)
    }

    /// Joins the entry's in-flight fetch or starts a new one. Caller holds the lock.
    fn start_fetch(&self, key: &QueryKey, entry: &mut Entry, fetcher: Fetcher) -> (u64, SharedFetch) {
        if let Some(in_flight) = &entry.in_flight {
            return (in_flight.id, in_flight.fetch.clone());
        }
        let id = self.inner.fetch_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let fut = fetcher();
        let fetch = async move { fut.await.map_err(Arc::new) }.boxed().shared();
        entry.in_flight = Some(InFlight {
            id,
            fetch: fetch.clone(),
        });
        entry.touch();
        debug!(key = %key, fetch = id, "fetch started");
        (id, fetch)
    }

    async fn settle_fetch(&self, key: &QueryKey, (id, fetch): (u64, SharedFetch)) {
        let result = fetch.await;
        self.complete(key, id, result);
    }

    fn spawn_settle(&self, key: QueryKey, pending: (u64, SharedFetch)) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.clone();
                handle.spawn(async move { client.settle_fetch(&key, pending).await });
            }
            // The shared fetch stays registered; the next caller drives it.
            Err(_) => debug!(key = %key, "no runtime, background fetch deferred"),
        }
    }

    /// Applies a fetch result unless that fetch was cancelled or superseded.
    fn complete(&self, key: &QueryKey, id: u64, result: FetchResult) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if !entry.in_flight.as_ref().is_some_and(|f| f.id == id) {
            return;
        }
        entry.in_flight = None;
        match result {
            Ok(data) => {
                debug!(key = %key, fetch = id, "fetch succeeded");
                entry.set(Some(data));
            }
            Err(error) => {
                debug!(key = %key, fetch = id, error = %error, "fetch failed");
                entry.error = Some(error);
                entry.touch();
            }
        }
    }

    fn release(&self, key: &QueryKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }

    fn set_observing(&self, key: &QueryKey, options: QueryOptions, enabled: bool) {
        let pending = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            if !enabled {
                entry.observers = entry.observers.saturating_sub(1);
                entry.touch();
                return;
            }
            entry.observers += 1;
            match entry.fetcher.clone() {
                Some(fetcher) if !entry.is_fresh(options.stale_time) => {
                    Some(self.start_fetch(key, entry, fetcher))
                }
                _ => {
                    entry.touch();
                    None
                }
            }
        };
        if let Some(pending) = pending {
            self.spawn_settle(key.clone(), pending);
        }
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, IngatinError>> + Send + 'static,
{
    Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
    })
}

/// A live subscription to one cache entry. Dropping it deregisters the observer.
pub struct QueryObserver<T> {
    client: QueryClient,
    key: QueryKey,
    options: QueryOptions,
    changes: watch::Receiver<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> QueryObserver<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// Snapshot of the entry for rendering.
    pub fn state(&self) -> QueryState<T> {
        let mut state = self.client.state::<T>(&self.key);
        if !self.options.enabled {
            state.is_loading = false;
        }
        state
    }

    /// Waits until the entry changes. Returns `false` once the cache is gone.
    pub async fn changed(&mut self) -> bool {
        self.changes.changed().await.is_ok()
    }

    /// Refetches regardless of freshness and returns the new state.
    pub async fn refetch(&self) -> QueryState<T> {
        if self.options.enabled {
            self.client.refetch(&self.key).await;
        }
        self.state()
    }

    /// Turns fetching on or off, e.g. when the auth state resolves.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.options.enabled == enabled {
            return;
        }
        self.options.enabled = enabled;
        self.client.set_observing(&self.key, self.options, enabled);
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        if self.options.enabled {
            self.client.release(&self.key);
        }
    }
}
