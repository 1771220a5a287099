// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime invalidation: turns row-level change notifications into cache
//! invalidations.
//!
//! Each subscription owns one channel on the [`ChangeFeed`] and one
//! dispatcher task draining a bounded inbox. While the channel is
//! `Subscribed`, every accepted change invalidates each bound key once.
//! Terminal states are logged and published, never retried.

use std::fmt;
use std::sync::Arc;

use ingatin_core::{
    ChangeEvent, ChangeFeed, ChannelHandle, ChannelMessage, ChannelSpec,
    SubscriptionStatus,
};
use strum::Display;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, error, info};

use crate::client::QueryClient;
use crate::key::{QueryKey, user_keys};

/// Name of the channel watching the `users` table.
pub const USERS_CHANNEL: &str = "users-changes";

/// Receiver of invalidations. Implemented by [`QueryClient`]; tests count calls.
pub trait InvalidationSink: Send + Sync + 'static {
    fn invalidate(&self, key: &QueryKey);
}

impl InvalidationSink for QueryClient {
    fn invalidate(&self, key: &QueryKey) {
        QueryClient::invalidate(self, key);
    }
}

/// Hook run with every accepted change, before invalidation.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// One channel and the query keys its changes invalidate.
#[derive(Clone)]
pub struct InvalidationBinding {
    channel: ChannelSpec,
    keys: Vec<QueryKey>,
    on_change: Option<ChangeCallback>,
}

impl fmt::Debug for InvalidationBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationBinding")
            .field("channel", &self.channel)
            .field("keys", &self.keys)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl InvalidationBinding {
    /// Binds `keys` to `channel`. Duplicate keys are dropped so each is
    /// invalidated once per change.
    pub fn new<I>(channel: ChannelSpec, keys: I) -> Self
    where
        I: IntoIterator<Item = QueryKey>,
    {
        let mut unique: Vec<QueryKey> = Vec::new();
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        Self {
            channel,
            keys: unique,
            on_change: None,
        }
    }

    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(callback));
        self
    }

    pub fn channel(&self) -> &ChannelSpec {
        &self.channel
    }

    pub fn keys(&self) -> &[QueryKey] {
        &self.keys
    }

    /// Whether `change` belongs to this binding's schema, table and event filter.
    pub fn accepts(&self, change: &ChangeEvent) -> bool {
        change.schema == self.channel.schema
            && change.table == self.channel.table
            && self.channel.event.matches(change.kind)
    }
}

/// Data-driven map from table and event filter to the keys they invalidate.
#[derive(Debug, Clone, Default)]
pub struct InvalidationTable {
    bindings: Vec<InvalidationBinding>,
}

impl InvalidationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dashboard's table: every change on `table` invalidates `["users"]`.
    pub fn users(table: &str) -> Self {
        Self::new().bind(InvalidationBinding::new(
            ChannelSpec::table(USERS_CHANNEL, table),
            [user_keys::all()],
        ))
    }

    pub fn bind(mut self, binding: InvalidationBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn bindings(&self) -> &[InvalidationBinding] {
        &self.bindings
    }
}

/// Coarse connection indicator for the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RealtimeStatus {
    Connected,
    Connecting,
    Disconnected,
}

impl From<SubscriptionStatus> for RealtimeStatus {
    fn from(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::Subscribed => RealtimeStatus::Connected,
            SubscriptionStatus::Connecting => RealtimeStatus::Connecting,
            _ => RealtimeStatus::Disconnected,
        }
    }
}

/// Opens subscriptions on a [`ChangeFeed`] and routes their changes to a sink.
#[derive(Clone)]
pub struct RealtimeBridge {
    feed: Arc<dyn ChangeFeed>,
    sink: Arc<dyn InvalidationSink>,
    inbox_capacity: usize,
}

impl fmt::Debug for RealtimeBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeBridge")
            .field("feed", &self.feed.name())
            .field("inbox_capacity", &self.inbox_capacity)
            .finish()
    }
}

impl RealtimeBridge {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        sink: Arc<dyn InvalidationSink>,
        inbox_capacity: usize,
    ) -> Self {
        Self {
            feed,
            sink,
            inbox_capacity: inbox_capacity.max(1),
        }
    }

    /// Opens the binding's channel and starts its dispatcher.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn subscribe(&self, binding: InvalidationBinding) -> RealtimeSubscription {
        let (inbox_tx, inbox_rx) = mpsc::channel(self.inbox_capacity);
        let (status_tx, status_rx) = watch::channel(SubscriptionStatus::Connecting);
        let handle = self.feed.subscribe(binding.channel.clone(), inbox_tx);
        debug!(channel = %binding.channel.name, table = %binding.channel.table, event = %binding.channel.event, "opening realtime channel");

        let dispatcher = Dispatcher {
            binding,
            sink: self.sink.clone(),
            status: status_tx,
        };
        tokio::spawn(dispatcher.run(inbox_rx).in_current_span());

        RealtimeSubscription {
            handle,
            status: status_rx,
        }
    }

    /// One subscription per binding of `table`.
    pub fn subscribe_all(&self, table: &InvalidationTable) -> Vec<RealtimeSubscription> {
        table
            .bindings()
            .iter()
            .cloned()
            .map(|binding| self.subscribe(binding))
            .collect()
    }
}

struct Dispatcher {
    binding: InvalidationBinding,
    sink: Arc<dyn InvalidationSink>,
    status: watch::Sender<SubscriptionStatus>,
}

impl Dispatcher {
    async fn run(self, mut inbox: mpsc::Receiver<ChannelMessage>) {
        while let Some(message) = inbox.recv().await {
            match message {
                ChannelMessage::Status(status) => {
                    self.transition(status);
                    if status.is_terminal() {
                        return;
                    }
                }
                ChannelMessage::Change(change) => self.dispatch(&change),
            }
        }
        // Feed went away without reporting a terminal state.
        self.transition(SubscriptionStatus::Closed);
    }

    fn transition(&self, status: SubscriptionStatus) {
        let current = *self.status.borrow();
        if current.is_terminal() || current == status {
            return;
        }
        let channel = &self.binding.channel;
        match status {
            SubscriptionStatus::Subscribed => {
                info!(channel = %channel.name, table = %channel.table, "realtime subscribed");
            }
            SubscriptionStatus::ChannelError | SubscriptionStatus::TimedOut => {
                error!(channel = %channel.name, table = %channel.table, status = %status, "realtime subscription failed");
            }
            SubscriptionStatus::Closed => {
                info!(channel = %channel.name, "realtime subscription closed");
            }
            SubscriptionStatus::Connecting => {
                debug!(channel = %channel.name, "realtime connecting");
            }
        }
        self.status.send_replace(status);
    }

    fn dispatch(&self, change: &ChangeEvent) {
        let channel = &self.binding.channel;
        if *self.status.borrow() != SubscriptionStatus::Subscribed {
            debug!(channel = %channel.name, "change outside subscribed state dropped");
            return;
        }
        if !self.binding.accepts(change) {
            return;
        }
        debug!(channel = %channel.name, table = %change.table, kind = %change.kind, "change received");
        if let Some(callback) = &self.binding.on_change {
            callback(change);
        }
        for key in &self.binding.keys {
            self.sink.invalidate(key);
        }
    }
}

/// A live channel. Closing or dropping it tears the channel down once.
#[derive(Debug)]
pub struct RealtimeSubscription {
    handle: ChannelHandle,
    status: watch::Receiver<SubscriptionStatus>,
}

impl RealtimeSubscription {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn status(&self) -> SubscriptionStatus {
        *self.status.borrow()
    }

    pub fn realtime_status(&self) -> RealtimeStatus {
        self.status().into()
    }

    /// A receiver that wakes on every status transition.
    pub fn watch_status(&self) -> watch::Receiver<SubscriptionStatus> {
        self.status.clone()
    }

    /// Returns `true` only for the call that closed the channel.
    pub fn close(&mut self) -> bool {
        self.handle.close()
    }
}
