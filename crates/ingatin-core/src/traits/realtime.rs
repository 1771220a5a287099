// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change-notification feed and the handle that closes a channel.

use tokio::sync::{mpsc, oneshot};

use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelMessage, ChannelSpec};

/// Adapter for the backend's push-change-notification stream.
///
/// `subscribe` returns immediately in the `Connecting` state. The feed then
/// pushes [`ChannelMessage::Status`] transitions and one
/// [`ChannelMessage::Change`] per row-level change into `inbox` until the
/// returned handle is closed or the channel reaches a terminal state.
pub trait ChangeFeed: PluginAdapter {
    fn subscribe(&self, spec: ChannelSpec, inbox: mpsc::Sender<ChannelMessage>) -> ChannelHandle;
}

/// Owner of one live channel. Closing (or dropping) it tears the channel down.
///
/// The close signal is a oneshot, so a channel is torn down at most once no
/// matter how many times `close` is called.
#[derive(Debug)]
pub struct ChannelHandle {
    name: String,
    close_tx: Option<oneshot::Sender<()>>,
}

impl ChannelHandle {
    /// Creates a handle and the receiver the feed task watches for teardown.
    pub fn new(name: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (close_tx, close_rx) = oneshot::channel();
        (
            Self {
                name: name.into(),
                close_tx: Some(close_tx),
            },
            close_rx,
        )
    }

    /// Channel name this handle owns.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signals teardown. Returns `true` only for the call that actually closed the channel.
    pub fn close(&mut self) -> bool {
        match self.close_tx.take() {
            Some(tx) => {
                // The feed task may already be gone after a terminal state.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.close_tx.is_none()
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_fires_exactly_once() {
        let (mut handle, close_rx) = ChannelHandle::new("users-changes");
        assert!(!handle.is_closed());
        assert!(handle.close());
        assert!(!handle.close());
        assert!(handle.is_closed());
        assert!(close_rx.await.is_ok());
    }

    #[tokio::test]
    async fn drop_signals_teardown() {
        let (handle, close_rx) = ChannelHandle::new("users-changes");
        drop(handle);
        assert!(close_rx.await.is_ok());
    }
}
