// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime [`ChangeFeed`] over the Phoenix channel socket.
//!
//! Each subscription owns one socket and one spawned task. The task joins
//! the channel, keeps the socket alive with heartbeats, forwards row-level
//! changes into the subscriber's inbox, and reports every status transition
//! there too. Terminal states end the task; nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use ingatin_config::model::RealtimeConfig;
use ingatin_core::{
    AdapterType, ChangeFeed, ChannelHandle, ChannelMessage, ChannelSpec, HealthStatus,
    IngatinError, PluginAdapter, SubscriptionStatus,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at, sleep};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::client::SupabaseClient;
use crate::protocol::{Frame, PhoenixMessage, classify};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type SocketSink = futures::stream::SplitSink<Socket, Message>;

/// Change feed backed by Supabase Realtime.
#[derive(Debug, Clone)]
pub struct SupabaseRealtime {
    client: SupabaseClient,
    heartbeat: Duration,
    join_timeout: Duration,
}

impl SupabaseRealtime {
    pub fn new(client: SupabaseClient, heartbeat: Duration, join_timeout: Duration) -> Self {
        Self {
            client,
            heartbeat,
            join_timeout,
        }
    }

    pub fn from_config(client: SupabaseClient, config: &RealtimeConfig) -> Self {
        Self::new(
            client,
            Duration::from_secs(config.heartbeat_secs),
            Duration::from_secs(config.join_timeout_secs),
        )
    }
}

#[async_trait]
impl PluginAdapter for SupabaseRealtime {
    fn name(&self) -> &str {
        "supabase-realtime"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Realtime
    }

    async fn health_check(&self) -> Result<HealthStatus, IngatinError> {
        let url = self.client.realtime_url();
        match tokio::time::timeout(self.join_timeout, connect_async(&url)).await {
            Ok(Ok((mut ws, _))) => {
                let _ = ws.close(None).await;
                Ok(HealthStatus::Healthy)
            }
            Ok(Err(e)) => Ok(HealthStatus::Unhealthy(format!("socket unreachable: {e}"))),
            Err(_) => Ok(HealthStatus::Degraded("socket handshake timed out".into())),
        }
    }
}

impl ChangeFeed for SupabaseRealtime {
    /// Spawns the channel task. Must be called inside a Tokio runtime.
    fn subscribe(&self, spec: ChannelSpec, inbox: mpsc::Sender<ChannelMessage>) -> ChannelHandle {
        let (handle, close_rx) = ChannelHandle::new(spec.name.clone());
        let task = ChannelTask {
            url: self.client.realtime_url(),
            access_token: self.client.bearer(),
            topic: PhoenixMessage::topic_for(&spec.name),
            spec,
            inbox,
            heartbeat: self.heartbeat,
            join_timeout: self.join_timeout,
            next_ref: 0,
        };
        tokio::spawn(task.run(close_rx));
        handle
    }
}

/// Why the channel loop stopped.
enum Exit {
    Status(SubscriptionStatus),
    /// The subscriber dropped its inbox; nobody is left to tell.
    Abandoned,
}

struct ChannelTask {
    url: String,
    access_token: String,
    topic: String,
    spec: ChannelSpec,
    inbox: mpsc::Sender<ChannelMessage>,
    heartbeat: Duration,
    join_timeout: Duration,
    next_ref: u64,
}

impl ChannelTask {
    async fn run(mut self, mut close_rx: oneshot::Receiver<()>) {
        if !self.emit(SubscriptionStatus::Connecting).await {
            return;
        }

        let status = match self.drive(&mut close_rx).await {
            Exit::Status(status) => status,
            Exit::Abandoned => {
                debug!(channel = %self.spec.name, "subscriber gone, channel task ending");
                return;
            }
        };

        debug!(channel = %self.spec.name, status = %status, "channel task finished");
        self.emit(status).await;
    }

    async fn drive(&mut self, close_rx: &mut oneshot::Receiver<()>) -> Exit {
        let connect = tokio::select! {
            _ = &mut *close_rx => return Exit::Status(SubscriptionStatus::Closed),
            res = tokio::time::timeout(self.join_timeout, connect_async(&self.url)) => res,
        };
        let socket = match connect {
            Ok(Ok((socket, _))) => socket,
            Ok(Err(e)) => {
                warn!(channel = %self.spec.name, error = %e, "realtime connection failed");
                return Exit::Status(SubscriptionStatus::ChannelError);
            }
            Err(_) => return Exit::Status(SubscriptionStatus::TimedOut),
        };
        let (mut sink, mut stream) = socket.split();

        let join_ref = self.take_ref();
        let join = PhoenixMessage::join(&self.spec, &self.access_token, &join_ref);
        if send(&mut sink, &join).await.is_err() {
            return Exit::Status(SubscriptionStatus::ChannelError);
        }

        let join_deadline = sleep(self.join_timeout);
        tokio::pin!(join_deadline);
        let mut joined = false;
        let mut heartbeat = interval_at(Instant::now() + self.heartbeat, self.heartbeat);

        loop {
            tokio::select! {
                _ = &mut *close_rx => {
                    self.leave(&mut sink, &join_ref).await;
                    return Exit::Status(SubscriptionStatus::Closed);
                }
                _ = &mut join_deadline, if !joined => {
                    self.leave(&mut sink, &join_ref).await;
                    return Exit::Status(SubscriptionStatus::TimedOut);
                }
                _ = heartbeat.tick() => {
                    let beat = PhoenixMessage::heartbeat(&self.take_ref());
                    if send(&mut sink, &beat).await.is_err() {
                        return Exit::Status(SubscriptionStatus::Closed);
                    }
                }
                frame = stream.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => {
                            return Exit::Status(SubscriptionStatus::Closed);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!(channel = %self.spec.name, error = %e, "realtime socket error");
                            return Exit::Status(SubscriptionStatus::Closed);
                        }
                    };
                    let msg: PhoenixMessage = match serde_json::from_str(text.as_str()) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!(channel = %self.spec.name, error = %e, "ignoring undecodable frame");
                            continue;
                        }
                    };
                    match classify(&msg, &self.topic, &join_ref) {
                        Frame::JoinReply(Ok(())) if !joined => {
                            joined = true;
                            debug!(channel = %self.spec.name, topic = %self.topic, "join acknowledged");
                            if !self.emit(SubscriptionStatus::Subscribed).await {
                                self.leave(&mut sink, &join_ref).await;
                                return Exit::Abandoned;
                            }
                        }
                        Frame::JoinReply(Ok(())) => {}
                        Frame::JoinReply(Err(reason)) => {
                            warn!(channel = %self.spec.name, reason = %reason, "join rejected");
                            return Exit::Status(SubscriptionStatus::ChannelError);
                        }
                        Frame::Change(change) if joined => {
                            debug!(channel = %self.spec.name, table = %change.table, kind = %change.kind, "change received");
                            if self.inbox.send(ChannelMessage::Change(change)).await.is_err() {
                                self.leave(&mut sink, &join_ref).await;
                                return Exit::Abandoned;
                            }
                        }
                        Frame::Change(_) => {}
                        Frame::Close => return Exit::Status(SubscriptionStatus::Closed),
                        Frame::Error(reason) => {
                            warn!(channel = %self.spec.name, reason = %reason, "channel error");
                            return Exit::Status(SubscriptionStatus::ChannelError);
                        }
                        Frame::Ignored => {}
                    }
                }
            }
        }
    }

    fn take_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    async fn leave(&mut self, sink: &mut SocketSink, join_ref: &str) {
        let msg_ref = self.take_ref();
        let leave = PhoenixMessage::leave(&self.topic, &msg_ref, join_ref);
        let _ = send(sink, &leave).await;
        let _ = sink.close().await;
    }

    /// Returns `false` once the subscriber has dropped its inbox.
    async fn emit(&self, status: SubscriptionStatus) -> bool {
        self.inbox.send(ChannelMessage::Status(status)).await.is_ok()
    }
}

async fn send(sink: &mut SocketSink, msg: &PhoenixMessage) -> Result<(), IngatinError> {
    let text = msg
        .to_text()
        .map_err(|e| IngatinError::Internal(format!("failed to encode frame: {e}")))?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| IngatinError::Remote {
            message: format!("realtime send failed: {e}"),
            source: Some(Box::new(e)),
        })
}

#[cfg(test)]
mod tests {
    use ingatin_core::{ChangeKind, EventFilter};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::protocol::{EVENT_JOIN, EVENT_LEAVE};

    type ServerSocket = WebSocketStream<TcpStream>;

    async fn next_frame(ws: &mut ServerSocket) -> Option<PhoenixMessage> {
        while let Some(msg) = ws.next().await {
            match msg.ok()? {
                Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
                Message::Close(_) => return None,
                _ => continue,
            }
        }
        None
    }

    async fn push(ws: &mut ServerSocket, topic: &str, event: &str, payload: Value, msg_ref: Option<&str>) {
        let msg = PhoenixMessage {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            msg_ref: msg_ref.map(str::to_string),
            join_ref: None,
        };
        ws.send(Message::Text(msg.to_text().unwrap().into()))
            .await
            .unwrap();
    }

    async fn feed_for(listener: &TcpListener, join_timeout: Duration) -> SupabaseRealtime {
        let addr = listener.local_addr().unwrap();
        let client = SupabaseClient::new(
            &format!("http://{addr}"),
            SecretString::from("anon-key"),
            Duration::from_secs(5),
        )
        .unwrap();
        SupabaseRealtime::new(client, Duration::from_secs(25), join_timeout)
    }

    async fn expect_status(rx: &mut mpsc::Receiver<ChannelMessage>, status: SubscriptionStatus) {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(ChannelMessage::Status(got))) => assert_eq!(got, status),
            other => panic!("expected status {status}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscribes_forwards_changes_and_leaves_on_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let feed = feed_for(&listener, Duration::from_secs(5)).await;

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let join = next_frame(&mut ws).await.unwrap();
            assert_eq!(join.event, EVENT_JOIN);
            assert_eq!(join.payload["config"]["postgres_changes"][0]["table"], "users");
            push(&mut ws, &join.topic, "phx_reply", json!({"status": "ok", "response": {}}), join.msg_ref.as_deref()).await;
            push(
                &mut ws,
                &join.topic,
                "postgres_changes",
                json!({"data": {
                    "schema": "public",
                    "table": "users",
                    "type": "UPDATE",
                    "record": {"id": "u-1", "absen_pagi": true},
                    "old_record": {"id": "u-1"},
                    "commit_timestamp": "2026-10-17T07:05:00Z"
                }}),
                None,
            )
            .await;
            loop {
                match next_frame(&mut ws).await {
                    Some(frame) if frame.event == EVENT_LEAVE => return (join, frame),
                    Some(_) => continue,
                    None => panic!("socket closed before phx_leave"),
                }
            }
        });

        let (tx, mut rx) = mpsc::channel(8);
        let spec = ChannelSpec::table("users-changes", "users").with_event(EventFilter::All);
        let mut handle = feed.subscribe(spec, tx);

        expect_status(&mut rx, SubscriptionStatus::Connecting).await;
        expect_status(&mut rx, SubscriptionStatus::Subscribed).await;
        match rx.recv().await {
            Some(ChannelMessage::Change(change)) => {
                assert_eq!(change.kind, ChangeKind::Update);
                assert_eq!(change.record.unwrap()["id"], "u-1");
            }
            other => panic!("expected change, got {other:?}"),
        }

        assert!(handle.close());
        expect_status(&mut rx, SubscriptionStatus::Closed).await;
        let (join, leave) = server.await.unwrap();
        assert_eq!(leave.topic, "realtime:users-changes");
        assert_eq!(leave.join_ref, join.msg_ref);
        assert_ne!(leave.msg_ref, join.msg_ref);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn missing_join_reply_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let feed = feed_for(&listener, Duration::from_millis(200)).await;

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while next_frame(&mut ws).await.is_some() {}
        });

        let (tx, mut rx) = mpsc::channel(8);
        let _handle = feed.subscribe(ChannelSpec::table("users-changes", "users"), tx);
        expect_status(&mut rx, SubscriptionStatus::Connecting).await;
        expect_status(&mut rx, SubscriptionStatus::TimedOut).await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_join_is_channel_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let feed = feed_for(&listener, Duration::from_secs(5)).await;

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let join = next_frame(&mut ws).await.unwrap();
            push(
                &mut ws,
                &join.topic,
                "phx_reply",
                json!({"status": "error", "response": {"reason": "Unauthorized"}}),
                join.msg_ref.as_deref(),
            )
            .await;
            while next_frame(&mut ws).await.is_some() {}
        });

        let (tx, mut rx) = mpsc::channel(8);
        let _handle = feed.subscribe(ChannelSpec::table("users-changes", "users"), tx);
        expect_status(&mut rx, SubscriptionStatus::Connecting).await;
        expect_status(&mut rx, SubscriptionStatus::ChannelError).await;
    }

    #[tokio::test]
    async fn server_close_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let feed = feed_for(&listener, Duration::from_secs(5)).await;

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let join = next_frame(&mut ws).await.unwrap();
            push(&mut ws, &join.topic, "phx_reply", json!({"status": "ok", "response": {}}), join.msg_ref.as_deref()).await;
            push(&mut ws, &join.topic, "phx_close", json!({}), None).await;
            while next_frame(&mut ws).await.is_some() {}
        });

        let (tx, mut rx) = mpsc::channel(8);
        let _handle = feed.subscribe(ChannelSpec::table("users-changes", "users"), tx);
        expect_status(&mut rx, SubscriptionStatus::Connecting).await;
        expect_status(&mut rx, SubscriptionStatus::Subscribed).await;
        expect_status(&mut rx, SubscriptionStatus::Closed).await;
    }

    #[tokio::test]
    async fn unreachable_socket_is_channel_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let feed = feed_for(&listener, Duration::from_secs(2)).await;
        drop(listener);

        let (tx, mut rx) = mpsc::channel(8);
        let _handle = feed.subscribe(ChannelSpec::table("users-changes", "users"), tx);
        expect_status(&mut rx, SubscriptionStatus::Connecting).await;
        expect_status(&mut rx, SubscriptionStatus::ChannelError).await;
    }
}
