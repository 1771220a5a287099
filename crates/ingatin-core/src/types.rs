// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the adapters, the query cache, and the views.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Server-assigned identifier of a row in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One attendance record as stored in the `users` table.
///
/// The dashboard only ever holds a cached projection of this row; the
/// remote store owns it and the messaging bot mutates it independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Messaging address, e.g. `628123456789@s.whatsapp.net`.
    pub number: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Morning check-in done.
    pub absen_pagi: bool,
    /// Evening check-in done.
    pub absen_sore: bool,
    #[serde(default)]
    pub last_checkin: Option<DateTime<Utc>>,
    #[serde(default)]
    pub suspend_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable subset of [`User`]: everything the server does not assign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub absen_pagi: bool,
    pub absen_sore: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkin: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend_until: Option<DateTime<Utc>>,
}

/// Partial update of a [`User`]. Absent fields are left untouched.
///
/// Nullable columns use `Option<Option<_>>`: `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absen_pagi: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absen_sore: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checkin: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspend_until: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPatch {
    /// Patch that sets the morning check-in flag.
    pub fn morning(done: bool) -> Self {
        Self {
            absen_pagi: Some(done),
            ..Self::default()
        }
    }

    /// Patch that sets the evening check-in flag.
    pub fn evening(done: bool) -> Self {
        Self {
            absen_sore: Some(done),
            ..Self::default()
        }
    }

    /// Patch that sets (or clears) the display name.
    pub fn rename(name: Option<String>) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    /// Returns the same patch with `updated_at` stamped.
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// `true` when the patch changes no column.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the present fields into `user`.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(number) = &self.number {
            user.number = number.clone();
        }
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(v) = self.absen_pagi {
            user.absen_pagi = v;
        }
        if let Some(v) = self.absen_sore {
            user.absen_sore = v;
        }
        if let Some(v) = self.last_checkin {
            user.last_checkin = v;
        }
        if let Some(v) = self.suspend_until {
            user.suspend_until = v;
        }
        if let Some(v) = self.updated_at {
            user.updated_at = v;
        }
    }
}

/// Which attendance flag an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Shift {
    /// `absen_pagi`
    Morning,
    /// `absen_sore`
    Evening,
}

impl Shift {
    /// Column name of the flag in the `users` table.
    pub fn column(self) -> &'static str {
        match self {
            Shift::Morning => "absen_pagi",
            Shift::Evening => "absen_sore",
        }
    }

    /// Reads the flag from a user record.
    pub fn is_done(self, user: &User) -> bool {
        match self {
            Shift::Morning => user.absen_pagi,
            Shift::Evening => user.absen_sore,
        }
    }

    /// Patch that sets this flag.
    pub fn patch(self, done: bool) -> UserPatch {
        match self {
            Shift::Morning => UserPatch::morning(done),
            Shift::Evening => UserPatch::evening(done),
        }
    }
}

// --- Session types ---

/// Identity of the signed-in staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session issued by the hosted auth service.
#[derive(Debug)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthIdentity,
}

impl Session {
    /// `true` if the access token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            access_token: SecretString::from(self.access_token.expose_secret().to_owned()),
            refresh_token: SecretString::from(self.refresh_token.expose_secret().to_owned()),
            expires_at: self.expires_at,
            user: self.user.clone(),
        }
    }
}

/// Kind of auth-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// An auth-change notification together with the session it produced.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

// --- Realtime types ---

/// Row-level change type reported by the notification stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Event filter of a channel subscription.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum EventFilter {
    #[strum(serialize = "*")]
    #[serde(rename = "*")]
    All,
    #[strum(serialize = "INSERT")]
    #[serde(rename = "INSERT")]
    Insert,
    #[strum(serialize = "UPDATE")]
    #[serde(rename = "UPDATE")]
    Update,
    #[strum(serialize = "DELETE")]
    #[serde(rename = "DELETE")]
    Delete,
}

impl EventFilter {
    /// Whether a change of `kind` passes this filter.
    pub fn matches(self, kind: ChangeKind) -> bool {
        matches!(
            (self, kind),
            (EventFilter::All, _)
                | (EventFilter::Insert, ChangeKind::Insert)
                | (EventFilter::Update, ChangeKind::Update)
                | (EventFilter::Delete, ChangeKind::Delete)
        )
    }
}

/// What a realtime channel listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Channel name, e.g. `users-changes`.
    pub name: String,
    pub schema: String,
    pub table: String,
    pub event: EventFilter,
}

impl ChannelSpec {
    /// A channel on `public.<table>` receiving every event type.
    pub fn table(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: "public".to_string(),
            table: table.into(),
            event: EventFilter::All,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_event(mut self, event: EventFilter) -> Self {
        self.event = event;
        self
    }
}

/// One row-level change delivered on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub schema: String,
    pub table: String,
    pub kind: ChangeKind,
    pub record: Option<serde_json::Value>,
    pub old_record: Option<serde_json::Value>,
    pub commit_timestamp: Option<DateTime<Utc>>,
}

/// Lifecycle of a single channel subscription.
///
/// `Connecting -> Subscribed -> (ChannelError | TimedOut | Closed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Connecting,
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

impl SubscriptionStatus {
    /// Terminal states are never left again by the same subscription.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubscriptionStatus::ChannelError
                | SubscriptionStatus::TimedOut
                | SubscriptionStatus::Closed
        )
    }

    /// `ChannelError` and `TimedOut` are failures; `Closed` is a normal end.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            SubscriptionStatus::ChannelError | SubscriptionStatus::TimedOut
        )
    }
}

/// Message pushed by a [`ChangeFeed`](crate::traits::ChangeFeed) into a subscriber's inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Status(SubscriptionStatus),
    Change(ChangeEvent),
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of backend adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum AdapterType {
    Store,
    Auth,
    Realtime,
}
