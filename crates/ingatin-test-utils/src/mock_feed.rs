// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process change feed.
//!
//! `MockChangeFeed` implements `ChangeFeed` without a socket: subscriptions
//! are registered in memory and [`publish`](MockChangeFeed::publish) delivers
//! a change to every live channel whose schema, table and filter match.

use std::sync::Mutex;

use async_trait::async_trait;
use ingatin_core::{
    AdapterType, ChangeEvent, ChangeFeed, ChannelHandle, ChannelMessage, ChannelSpec,
    HealthStatus, IngatinError, PluginAdapter, SubscriptionStatus,
};
use tokio::sync::{mpsc, oneshot};

struct Channel {
    spec: ChannelSpec,
    inbox: mpsc::Sender<ChannelMessage>,
    close_rx: oneshot::Receiver<()>,
}

impl Channel {
    /// A handle that was closed or dropped ends the channel.
    fn is_open(&mut self) -> bool {
        matches!(self.close_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty))
    }
}

/// A mock realtime feed for testing.
pub struct MockChangeFeed {
    channels: Mutex<Vec<Channel>>,
    auto_subscribe: bool,
    opened: Mutex<Vec<ChannelSpec>>,
    closed: Mutex<usize>,
}

impl MockChangeFeed {
    /// A feed that acknowledges every join immediately.
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(Vec::new()),
            auto_subscribe: true,
            opened: Mutex::new(Vec::new()),
            closed: Mutex::new(0),
        }
    }

    /// A feed that leaves new channels `Connecting` until [`set_status`](Self::set_status).
    pub fn pending() -> Self {
        Self {
            auto_subscribe: false,
            ..Self::new()
        }
    }

    /// Delivers `change` to every matching live channel. Returns how many got it.
    pub fn publish(&self, change: ChangeEvent) -> usize {
        self.prune();
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .iter()
            .filter(|c| {
                c.spec.schema == change.schema
                    && c.spec.table == change.table
                    && c.spec.event.matches(change.kind)
            })
            .filter(|c| c.inbox.try_send(ChannelMessage::Change(change.clone())).is_ok())
            .count()
    }

    /// Pushes a status to every live channel. Terminal statuses end them.
    pub fn set_status(&self, status: SubscriptionStatus) {
        self.prune();
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for channel in channels.iter() {
            let _ = channel.inbox.try_send(ChannelMessage::Status(status));
        }
        if status.is_terminal() {
            channels.clear();
        }
    }

    /// Number of channels still open.
    pub fn live_channels(&self) -> usize {
        self.prune();
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every spec ever subscribed, in order.
    pub fn opened(&self) -> Vec<ChannelSpec> {
        self.opened.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Channels torn down by their handle.
    pub fn closed_count(&self) -> usize {
        self.prune();
        *self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prune(&self) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let before = channels.len();
        channels.retain_mut(|c| {
            let open = c.is_open();
            if !open {
                let _ = c.inbox.try_send(ChannelMessage::Status(SubscriptionStatus::Closed));
            }
            open
        });
        *self.closed.lock().unwrap_or_else(|e| e.into_inner()) += before - channels.len();
    }
}

impl Default for MockChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChangeFeed {
    fn name(&self) -> &str {
        "mock-feed"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Realtime
    }

    async fn health_check(&self) -> Result<HealthStatus, IngatinError> {
        Ok(HealthStatus::Healthy)
    }
}

impl ChangeFeed for MockChangeFeed {
    fn subscribe(&self, spec: ChannelSpec, inbox: mpsc::Sender<ChannelMessage>) -> ChannelHandle {
        let (handle, close_rx) = ChannelHandle::new(spec.name.clone());
        let _ = inbox.try_send(ChannelMessage::Status(SubscriptionStatus::Connecting));
        if self.auto_subscribe {
            let _ = inbox.try_send(ChannelMessage::Status(SubscriptionStatus::Subscribed));
        }
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Channel {
                spec,
                inbox,
                close_rx,
            });
        handle
    }
}

#[cfg(test)]
mod tests {
    use ingatin_core::{ChangeKind, EventFilter};

    use super::*;

    fn change(table: &str, kind: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            schema: "public".into(),
            table: table.into(),
            kind,
            record: None,
            old_record: None,
            commit_timestamp: None,
        }
    }

    #[tokio::test]
    async fn subscribe_reports_connecting_then_subscribed() {
        let feed = MockChangeFeed::new();
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = feed.subscribe(ChannelSpec::table("users-changes", "users"), tx);

        assert_eq!(
            rx.recv().await,
            Some(ChannelMessage::Status(SubscriptionStatus::Connecting))
        );
        assert_eq!(
            rx.recv().await,
            Some(ChannelMessage::Status(SubscriptionStatus::Subscribed))
        );
    }

    #[tokio::test]
    async fn publish_respects_filters() {
        let feed = MockChangeFeed::pending();
        let (tx, _rx) = mpsc::channel(8);
        let _all = feed.subscribe(ChannelSpec::table("a", "users"), tx);
        let (tx, _rx2) = mpsc::channel(8);
        let _deletes = feed.subscribe(
            ChannelSpec::table("b", "users").with_event(EventFilter::Delete),
            tx,
        );

        assert_eq!(feed.publish(change("users", ChangeKind::Update)), 1);
        assert_eq!(feed.publish(change("users", ChangeKind::Delete)), 2);
        assert_eq!(feed.publish(change("leaves", ChangeKind::Delete)), 0);
    }

    #[tokio::test]
    async fn closing_the_handle_ends_the_channel() {
        let feed = MockChangeFeed::new();
        let (tx, mut rx) = mpsc::channel(8);
        let mut handle = feed.subscribe(ChannelSpec::table("users-changes", "users"), tx);
        assert_eq!(feed.live_channels(), 1);

        assert!(handle.close());
        assert_eq!(feed.live_channels(), 0);
        assert_eq!(feed.closed_count(), 1);

        rx.recv().await;
        rx.recv().await;
        assert_eq!(
            rx.recv().await,
            Some(ChannelMessage::Status(SubscriptionStatus::Closed))
        );
    }
}
