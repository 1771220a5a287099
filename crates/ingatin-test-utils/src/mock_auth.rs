// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock auth service with one staff account.

use std::sync::Mutex;

use async_trait::async_trait;
use ingatin_core::{
    AdapterType, AuthEvent, AuthEventKind, AuthIdentity, AuthProvider, HealthStatus, IngatinError,
    PluginAdapter, Session,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;

pub const TEST_EMAIL: &str = "admin@ingatin.id";
pub const TEST_PASSWORD: &str = "rahasia";

/// A mock auth provider for testing.
///
/// Accepts only [`TEST_EMAIL`] / [`TEST_PASSWORD`] and emits the same
/// auth-change events as the hosted service.
pub struct MockAuth {
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MockAuth {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
            events: broadcast::channel(16).0,
        }
    }

    /// Starts with a stored session, as after an earlier login.
    pub fn signed_in() -> Self {
        let auth = Self::new();
        auth.install(Some(test_session()));
        auth
    }

    fn install(&self, session: Option<Session>) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = session;
    }

    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        let _ = self.events.send(AuthEvent { kind, session });
    }

    /// The refresh timer fired and the service issued a new access token.
    pub fn refresh(&self) {
        let mut session = test_session();
        session.access_token = SecretString::from("mock-access-token-refreshed".to_string());
        self.install(Some(session.clone()));
        self.emit(AuthEventKind::TokenRefreshed, Some(session));
    }

    /// The refresh timer fired and the service rejected the refresh token
    /// (expired, revoked, or signed out elsewhere).
    pub fn expire(&self) {
        self.install(None);
        self.emit(AuthEventKind::SignedOut, None);
    }

    pub fn access_token(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.access_token.expose_secret().to_owned())
    }
}

impl Default for MockAuth {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_session() -> Session {
    Session {
        access_token: SecretString::from("mock-access-token".to_string()),
        refresh_token: SecretString::from("mock-refresh-token".to_string()),
        expires_at: None,
        user: AuthIdentity {
            id: "00000000-0000-0000-0000-000000000001".into(),
            email: Some(TEST_EMAIL.into()),
        },
    }
}

#[async_trait]
impl PluginAdapter for MockAuth {
    fn name(&self) -> &str {
        "mock-auth"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Auth
    }

    async fn health_check(&self) -> Result<HealthStatus, IngatinError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn get_session(&self) -> Result<Option<Session>, IngatinError> {
        Ok(self.session.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, IngatinError> {
        if email != TEST_EMAIL || password.expose_secret() != TEST_PASSWORD {
            return Err(IngatinError::auth("Invalid login credentials"));
        }
        let session = test_session();
        self.install(Some(session.clone()));
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IngatinError> {
        self.install(None);
        self.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
