// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Ingat-In dashboard.

use thiserror::Error;

use crate::types::SubscriptionStatus;

/// The primary error type used across adapter traits, the query cache, and the views.
#[derive(Debug, Error)]
pub enum IngatinError {
    /// A remote store operation failed (network failure, constraint violation, bad response).
    #[error("remote error: {message}")]
    Remote {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single-row lookup matched no row.
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// A realtime channel entered a failure state.
    #[error("subscription to `{channel}` failed: {status}")]
    Subscription {
        channel: String,
        status: SubscriptionStatus,
    },

    /// Session check, sign-in, or sign-out failed.
    #[error("authentication error: {message}")]
    Auth {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (missing backend URL, invalid keys).
    #[error("configuration error: {0}")]
    Config(String),

    /// User input rejected before reaching the store.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IngatinError {
    /// Builds a [`IngatinError::Remote`] without an underlying source.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`IngatinError::Auth`] without an underlying source.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for [`IngatinError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
