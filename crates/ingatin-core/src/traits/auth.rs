// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session boundary of the hosted auth service.

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::broadcast;

use crate::error::IngatinError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AuthEvent, Session};

/// Adapter for the hosted authentication service.
///
/// The dashboard never manages sessions itself: it restores, observes,
/// and ends them through this trait.
#[async_trait]
pub trait AuthProvider: PluginAdapter {
    /// Returns the current session, restoring (and refreshing) a persisted one if needed.
    async fn get_session(&self) -> Result<Option<Session>, IngatinError>;

    /// Signs in with email and password.
    async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, IngatinError>;

    /// Ends the current session.
    async fn sign_out(&self) -> Result<(), IngatinError>;

    /// Stream of auth-change notifications emitted after every session transition.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}
