// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session provider created once at the composition root.
//!
//! [`SessionManager::init`] restores the persisted session, publishes the
//! resulting [`AuthState`] on a watch channel, and keeps it current by
//! listening to the auth provider's change stream until shutdown.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use ingatin_core::{AuthEvent, AuthEventKind, AuthIdentity, AuthProvider, IngatinError, Session};
use secrecy::SecretString;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::guard::AuthState;

pub struct SessionManager {
    auth: Arc<dyn AuthProvider>,
    state: watch::Sender<AuthState>,
    identity: Mutex<Option<AuthIdentity>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("auth", &self.auth.name())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl SessionManager {
    /// Checks for an existing session and starts following auth changes.
    ///
    /// A failed session check resolves to `Unauthenticated`. Must be called
    /// from inside a Tokio runtime.
    pub async fn init(auth: Arc<dyn AuthProvider>) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::Unknown);
        let manager = Arc::new(Self {
            auth,
            state,
            identity: Mutex::new(None),
            cancel: CancellationToken::new(),
        });

        // Subscribe first so transitions during the check are not missed.
        let events = manager.auth.on_auth_state_change();
        match manager.auth.get_session().await {
            Ok(session) => manager.apply(session.as_ref()),
            Err(e) => {
                warn!(error = %e, "session check failed, continuing signed out");
                manager.apply(None);
            }
        }
        info!(state = %manager.state(), "session resolved");

        tokio::spawn(Self::listen(
            Arc::downgrade(&manager),
            events,
            manager.cancel.clone(),
        ));
        manager
    }

    async fn listen(
        manager: Weak<Self>,
        mut events: broadcast::Receiver<AuthEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            let Some(manager) = manager.upgrade() else {
                break;
            };
            match event {
                Ok(event) => manager.on_event(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth events lagged, re-checking session");
                    match manager.auth.get_session().await {
                        Ok(session) => manager.apply(session.as_ref()),
                        Err(e) => warn!(error = %e, "session re-check failed"),
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("auth listener stopped");
    }

    fn on_event(&self, event: AuthEvent) {
        debug!(kind = %event.kind, "auth event");
        match event.kind {
            AuthEventKind::SignedOut => self.apply(None),
            _ => self.apply(event.session.as_ref()),
        }
    }

    fn apply(&self, session: Option<&Session>) {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) =
            session.map(|s| s.user.clone());
        let next = if session.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(from = %current, to = %next, "auth state changed");
            *current = next;
            true
        });
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Signed-in staff member, if any.
    pub fn identity(&self) -> Option<AuthIdentity> {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver woken on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthIdentity, IngatinError> {
        let session = self.auth.sign_in(email, password).await?;
        self.apply(Some(&session));
        Ok(session.user)
    }

    /// Ends the session. Local state is cleared even if the server call fails.
    pub async fn sign_out(&self) -> Result<(), IngatinError> {
        let result = self.auth.sign_out().await;
        self.apply(None);
        result
    }

    /// Stops following auth changes.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use ingatin_core::{AdapterType, HealthStatus, PluginAdapter};
    use secrecy::ExposeSecret;

    use super::*;

    struct FakeAuth {
        session: Mutex<Option<Session>>,
        events: broadcast::Sender<AuthEvent>,
        broken: bool,
    }

    impl FakeAuth {
        fn new(signed_in: bool) -> Arc<Self> {
            Arc::new(Self {
                session: Mutex::new(signed_in.then(session)),
                events: broadcast::channel(16).0,
                broken: false,
            })
        }

        fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
            let _ = self.events.send(AuthEvent { kind, session });
        }
    }

    fn session() -> Session {
        Session {
            access_token: SecretString::from("access".to_string()),
            refresh_token: SecretString::from("refresh".to_string()),
            expires_at: None,
            user: AuthIdentity {
                id: "staff-1".into(),
                email: Some("admin@ingatin.id".into()),
            },
        }
    }

    #[async_trait]
    impl PluginAdapter for FakeAuth {
        fn name(&self) -> &str {
            "fake-auth"
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Auth
        }
        async fn health_check(&self) -> Result<HealthStatus, IngatinError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl AuthProvider for FakeAuth {
        async fn get_session(&self) -> Result<Option<Session>, IngatinError> {
            if self.broken {
                return Err(IngatinError::auth("network unreachable"));
            }
            Ok(self.session.lock().unwrap().clone())
        }

        async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, IngatinError> {
            if email != "admin@ingatin.id" || password.expose_secret() != "rahasia" {
                return Err(IngatinError::auth("Invalid login credentials"));
            }
            let s = session();
            *self.session.lock().unwrap() = Some(s.clone());
            self.emit(AuthEventKind::SignedIn, Some(s.clone()));
            Ok(s)
        }

        async fn sign_out(&self) -> Result<(), IngatinError> {
            *self.session.lock().unwrap() = None;
            self.emit(AuthEventKind::SignedOut, None);
            Ok(())
        }

        fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }
    }

    async fn wait_for(manager: &SessionManager, target: AuthState) {
        let mut rx = manager.subscribe();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| *s == target))
            .await
            .expect("state not reached")
            .unwrap();
    }

    #[tokio::test]
    async fn init_restores_existing_session() {
        let manager = SessionManager::init(FakeAuth::new(true)).await;
        assert_eq!(manager.state(), AuthState::Authenticated);
        assert_eq!(manager.identity().unwrap().id, "staff-1");
    }

    #[tokio::test]
    async fn init_without_session_is_unauthenticated() {
        let manager = SessionManager::init(FakeAuth::new(false)).await;
        assert_eq!(manager.state(), AuthState::Unauthenticated);
        assert!(manager.identity().is_none());
    }

    #[tokio::test]
    async fn failed_check_resolves_signed_out() {
        let auth = Arc::new(FakeAuth {
            session: Mutex::new(Some(session())),
            events: broadcast::channel(4).0,
            broken: true,
        });
        let manager = SessionManager::init(auth).await;
        assert_eq!(manager.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn sign_in_and_out_transition_state() {
        let manager = SessionManager::init(FakeAuth::new(false)).await;
        let password = SecretString::from("rahasia".to_string());
        let who = manager.sign_in("admin@ingatin.id", &password).await.unwrap();
        assert_eq!(who.email.as_deref(), Some("admin@ingatin.id"));
        assert!(manager.is_authenticated());

        manager.sign_out().await.unwrap();
        assert_eq!(manager.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn wrong_password_keeps_state() {
        let manager = SessionManager::init(FakeAuth::new(false)).await;
        let password = SecretString::from("salah".to_string());
        let err = manager.sign_in("admin@ingatin.id", &password).await.unwrap_err();
        assert!(matches!(err, IngatinError::Auth { .. }));
        assert_eq!(manager.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn follows_external_auth_events() {
        let auth = FakeAuth::new(true);
        let manager = SessionManager::init(auth.clone()).await;

        auth.emit(AuthEventKind::SignedOut, None);
        wait_for(&manager, AuthState::Unauthenticated).await;

        auth.emit(AuthEventKind::SignedIn, Some(session()));
        wait_for(&manager, AuthState::Authenticated).await;
    }

    #[tokio::test]
    async fn shutdown_stops_listening() {
        let auth = FakeAuth::new(true);
        let manager = SessionManager::init(auth.clone()).await;
        manager.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;

        auth.emit(AuthEventKind::SignedOut, None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.state(), AuthState::Authenticated);
    }
}
