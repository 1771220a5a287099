// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phoenix channel frames spoken by the Realtime socket (`vsn=1.0.0`).

use chrono::{DateTime, Utc};
use ingatin_core::{ChangeEvent, ChangeKind, ChannelSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Topic of socket-level messages such as heartbeats.
pub const PHOENIX_TOPIC: &str = "phoenix";

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const EVENT_SYSTEM: &str = "system";

/// One frame on the socket, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    /// Channel topic for a subscription name.
    pub fn topic_for(channel: &str) -> String {
        format!("realtime:{channel}")
    }

    /// Join request registering a `postgres_changes` listener for `spec`.
    pub fn join(spec: &ChannelSpec, access_token: &str, msg_ref: &str) -> Self {
        Self {
            topic: Self::topic_for(&spec.name),
            event: EVENT_JOIN.to_string(),
            payload: json!({
                "config": {
                    "broadcast": {"ack": false, "self": false},
                    "presence": {"key": ""},
                    "postgres_changes": [{
                        "event": spec.event.to_string(),
                        "schema": spec.schema,
                        "table": spec.table,
                    }],
                },
                "access_token": access_token,
            }),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(msg_ref.to_string()),
        }
    }

    pub fn leave(topic: &str, msg_ref: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    pub fn heartbeat(msg_ref: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// What an inbound frame means for one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Reply to our join: `Ok(())` or the server's reason.
    JoinReply(Result<(), String>),
    /// A row-level change.
    Change(ChangeEvent),
    /// The server closed the channel.
    Close,
    /// The server reported a channel error.
    Error(String),
    /// Heartbeat replies and frames for other topics.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct ReplyPayload {
    status: String,
    #[serde(default)]
    response: Value,
}

#[derive(Debug, Deserialize)]
struct SystemPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangesPayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    schema: String,
    table: String,
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
    #[serde(default)]
    commit_timestamp: Option<DateTime<Utc>>,
}

impl From<ChangeData> for ChangeEvent {
    fn from(data: ChangeData) -> Self {
        ChangeEvent {
            schema: data.schema,
            table: data.table,
            kind: data.kind,
            record: data.record.filter(non_empty),
            old_record: data.old_record.filter(non_empty),
            commit_timestamp: data.commit_timestamp,
        }
    }
}

/// Realtime sends `{}` for the missing side of an insert or delete.
fn non_empty(value: &Value) -> bool {
    !matches!(value, Value::Object(map) if map.is_empty()) && !value.is_null()
}

/// Interprets `msg` for the channel on `topic` joined with `join_ref`.
pub fn classify(msg: &PhoenixMessage, topic: &str, join_ref: &str) -> Frame {
    if msg.topic != topic {
        return Frame::Ignored;
    }
    match msg.event.as_str() {
        EVENT_REPLY if msg.msg_ref.as_deref() == Some(join_ref) => {
            match serde_json::from_value::<ReplyPayload>(msg.payload.clone()) {
                Ok(reply) if reply.status == "ok" => Frame::JoinReply(Ok(())),
                Ok(reply) => Frame::JoinReply(Err(reason(&reply.response)
                    .unwrap_or_else(|| format!("join rejected with status {}", reply.status)))),
                Err(e) => Frame::JoinReply(Err(format!("malformed join reply: {e}"))),
            }
        }
        EVENT_POSTGRES_CHANGES => {
            match serde_json::from_value::<ChangesPayload>(msg.payload.clone()) {
                Ok(changes) => Frame::Change(changes.data.into()),
                Err(e) => {
                    tracing::warn!(topic, error = %e, "dropping malformed change payload");
                    Frame::Ignored
                }
            }
        }
        EVENT_SYSTEM => match serde_json::from_value::<SystemPayload>(msg.payload.clone()) {
            Ok(system) if system.status.as_deref() == Some("error") => Frame::Error(
                system
                    .message
                    .unwrap_or_else(|| "realtime system error".to_string()),
            ),
            _ => Frame::Ignored,
        },
        EVENT_CLOSE => Frame::Close,
        EVENT_ERROR => Frame::Error(
            reason(&msg.payload).unwrap_or_else(|| "channel error".to_string()),
        ),
        _ => Frame::Ignored,
    }
}

fn reason(value: &Value) -> Option<String> {
    value
        .get("reason")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
