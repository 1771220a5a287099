// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GoTrue-backed [`AuthProvider`].
//!
//! Holds the current session in memory, mirrors it to an optional session
//! file so the next run restores it, refreshes access tokens with the
//! refresh token shortly before they expire, and broadcasts an
//! [`AuthEvent`] after every transition.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use ingatin_core::{
    AdapterType, AuthEvent, AuthEventKind, AuthIdentity, AuthProvider, HealthStatus,
    IngatinError, PluginAdapter, Session,
};
use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{GoTrueError, SupabaseClient, json_body, transport_error};

/// Capacity of the auth-event broadcast channel.
const EVENT_CAPACITY: usize = 16;

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Floor for the refresh timer, so a short-lived token cannot spin the task.
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Wait before retrying a refresh that failed in transit.
const REFRESH_RETRY: Duration = Duration::from_secs(15);

/// Time until a token expiring at `expires_at` should be refreshed.
fn refresh_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expires_at - now - ChronoDuration::seconds(EXPIRY_MARGIN_SECS))
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(MIN_REFRESH_DELAY)
}

/// Token grant response from `/auth/v1/token`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthIdentity,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .or_else(|| {
                self.expires_in
                    .map(|secs| now + ChronoDuration::seconds(secs))
            });
        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// On-disk form of a [`Session`].
#[derive(Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    expires_at: Option<DateTime<Utc>>,
    user: AuthIdentity,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.expose_secret().to_owned(),
            refresh_token: session.refresh_token.expose_secret().to_owned(),
            expires_at: session.expires_at,
            user: session.user.clone(),
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Session {
            access_token: SecretString::from(stored.access_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at: stored.expires_at,
            user: stored.user,
        }
    }
}

/// JSON session file written after sign-in and removed on sign-out.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session. A missing or unreadable file means "no session".
    pub async fn load(&self) -> Option<Session> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read session file");
                return None;
            }
        };
        match serde_json::from_str::<StoredSession>(&content) {
            Ok(stored) => Some(stored.into()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt session file");
                None
            }
        }
    }

    pub async fn save(&self, session: &Session) -> Result<(), IngatinError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| IngatinError::Internal(format!("failed to create session dir: {e}")))?;
        }
        let json = serde_json::to_string(&StoredSession::from(session))
            .map_err(|e| IngatinError::Internal(format!("failed to encode session: {e}")))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| IngatinError::Internal(format!("failed to write session file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = tokio::fs::set_permissions(&self.path, perms).await {
                warn!(path = %self.path.display(), error = %e, "failed to restrict session file");
            }
        }
        Ok(())
    }

    pub async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove session file"),
        }
    }
}

/// Auth adapter over the GoTrue endpoints of a Supabase project.
///
/// While a session with a known expiry is installed, a background task
/// refreshes it ahead of time. The task holds only a weak handle and is
/// cancelled on sign-out, on every new session, and on drop.
pub struct SupabaseAuth {
    me: Weak<Self>,
    client: SupabaseClient,
    session: Mutex<Option<Session>>,
    file: Option<SessionFile>,
    events: broadcast::Sender<AuthEvent>,
    refresh_timer: Mutex<Option<CancellationToken>>,
}

impl SupabaseAuth {
    /// Shared handle, as held by the session manager.
    pub fn new(client: SupabaseClient, file: Option<SessionFile>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            client,
            session: Mutex::new(None),
            file,
            events,
            refresh_timer: Mutex::new(None),
        })
    }

    fn current(&self) -> Option<Session> {
        match self.session.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn install(&self, session: Option<Session>) {
        let token = session
            .as_ref()
            .map(|s| SecretString::from(s.access_token.expose_secret().to_owned()));
        self.client.set_access_token(token);
        let expires_at = session.as_ref().and_then(|s| s.expires_at);
        match self.session.lock() {
            Ok(mut slot) => *slot = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
        match expires_at {
            Some(at) => self.schedule_refresh(refresh_delay(at, Utc::now())),
            None => self.replace_timer(None),
        }
    }

    fn replace_timer(&self, next: Option<CancellationToken>) {
        let previous = match self.refresh_timer.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Arms the refresh timer, replacing any pending one.
    fn schedule_refresh(&self, delay: Duration) {
        let cancel = CancellationToken::new();
        self.replace_timer(Some(cancel.clone()));
        let me = self.me.clone();
        debug!(delay_secs = delay.as_secs(), "token refresh scheduled");
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(auth) = me.upgrade() {
                        auth.refresh_installed().await;
                    }
                }
            }
        });
    }

    /// Timer body: swaps the installed session for a fresh one.
    ///
    /// A rejected refresh token ends the session; a transport failure is
    /// retried.
    async fn refresh_installed(&self) {
        let Some(session) = self.current() else {
            return;
        };
        match self.refresh(&session).await {
            Ok(refreshed) => {
                self.install(Some(refreshed.clone()));
                self.persist(&refreshed).await;
                self.emit(AuthEventKind::TokenRefreshed, Some(refreshed));
            }
            Err(IngatinError::Auth { message, .. }) => {
                warn!(reason = %message, "refresh token rejected, signing out");
                self.install(None);
                if let Some(file) = &self.file {
                    file.clear().await;
                }
                self.emit(AuthEventKind::SignedOut, None);
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, retrying");
                self.schedule_refresh(REFRESH_RETRY);
            }
        }
    }

    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        debug!(event = %kind, "auth state changed");
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(AuthEvent { kind, session });
    }

    async fn persist(&self, session: &Session) {
        if let Some(file) = &self.file
            && let Err(e) = file.save(session).await
        {
            warn!(error = %e, "session not persisted");
        }
    }

    async fn token_request<B: Serialize + ?Sized>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<Session, IngatinError> {
        let url = self.client.auth_url(&format!("token?grant_type={grant_type}"));
        let response = self
            .client
            .request(Method::POST, &url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(auth_error(response).await);
        }
        let token: TokenResponse = json_body(response).await?;
        Ok(token.into_session(Utc::now()))
    }

    /// Exchanges the refresh token for a new session.
    async fn refresh(&self, session: &Session) -> Result<Session, IngatinError> {
        let grant = RefreshGrant {
            refresh_token: session.refresh_token.expose_secret(),
        };
        let refreshed = self.token_request("refresh_token", &grant).await?;
        info!(user = %refreshed.user.id, "access token refreshed");
        Ok(refreshed)
    }

    /// Identity the auth service reports for the current access token.
    pub async fn current_user(&self) -> Result<Option<AuthIdentity>, IngatinError> {
        let Some(session) = self.current() else {
            return Ok(None);
        };
        let response = self
            .client
            .request_with_bearer(
                Method::GET,
                &self.client.auth_url("user"),
                session.access_token.expose_secret(),
            )
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(auth_error(response).await);
        }
        json_body(response).await.map(Some)
    }
}

#[async_trait]
impl PluginAdapter for SupabaseAuth {
    fn name(&self) -> &str {
        "supabase-auth"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Auth
    }

    async fn health_check(&self) -> Result<HealthStatus, IngatinError> {
        let response = match self
            .client
            .request(Method::GET, &self.client.auth_url("health"))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(HealthStatus::Unhealthy(format!("unreachable: {e}"))),
        };
        if response.status().is_success() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(format!(
                "auth service returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn get_session(&self) -> Result<Option<Session>, IngatinError> {
        let (session, restored) = match self.current() {
            Some(session) => (session, false),
            None => match &self.file {
                Some(file) => match file.load().await {
                    Some(session) => (session, true),
                    None => return Ok(None),
                },
                None => return Ok(None),
            },
        };

        let deadline = Utc::now() + ChronoDuration::seconds(EXPIRY_MARGIN_SECS);
        if !session.is_expired_at(deadline) {
            if restored {
                debug!(user = %session.user.id, "session restored from file");
                self.install(Some(session.clone()));
            }
            return Ok(Some(session));
        }

        match self.refresh(&session).await {
            Ok(refreshed) => {
                self.install(Some(refreshed.clone()));
                self.persist(&refreshed).await;
                self.emit(AuthEventKind::TokenRefreshed, Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(IngatinError::Auth { message, .. }) => {
                warn!(reason = %message, "stored session rejected, signing out locally");
                self.install(None);
                if let Some(file) = &self.file {
                    file.clear().await;
                }
                if !restored {
                    self.emit(AuthEventKind::SignedOut, None);
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, IngatinError> {
        let grant = PasswordGrant {
            email,
            password: password.expose_secret(),
        };
        let session = self.token_request("password", &grant).await?;
        info!(user = %session.user.id, "signed in");
        self.install(Some(session.clone()));
        self.persist(&session).await;
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IngatinError> {
        let session = self.current();
        let mut result = Ok(());

        if let Some(session) = &session {
            let outcome = self
                .client
                .request_with_bearer(
                    Method::POST,
                    &self.client.auth_url("logout"),
                    session.access_token.expose_secret(),
                )
                .send()
                .await;
            match outcome {
                Ok(response) if response.status().is_success() => {}
                // The token is already gone server-side; the local sign-out still applies.
                Ok(response)
                    if matches!(
                        response.status(),
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
                    ) => {}
                Ok(response) => result = Err(auth_error(response).await),
                Err(e) => result = Err(transport_error(e)),
            }
        }

        self.install(None);
        if let Some(file) = &self.file {
            file.clear().await;
        }
        info!("signed out");
        self.emit(AuthEventKind::SignedOut, None);
        result
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

impl Drop for SupabaseAuth {
    fn drop(&mut self) {
        self.replace_timer(None);
    }
}

async fn auth_error(response: Response) -> IngatinError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: GoTrueError = serde_json::from_str(&body).unwrap_or_default();
    let message = parsed.into_message(status);
    if status.is_client_error() {
        IngatinError::auth(message)
    } else {
        IngatinError::remote(message)
    }
}
