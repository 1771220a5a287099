// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data-access functions for the `users` table.

use async_trait::async_trait;

use crate::error::IngatinError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{NewUser, Shift, User, UserId, UserPatch};

/// Stateless request wrappers around the remote `users` table.
///
/// Errors from the backend are returned untouched as
/// [`IngatinError::Remote`]; single-row operations that match nothing
/// return [`IngatinError::NotFound`].
#[async_trait]
pub trait UserStore: PluginAdapter {
    /// All rows, newest `created_at` first.
    async fn list_users(&self) -> Result<Vec<User>, IngatinError>;

    /// Exactly one row by id.
    async fn get_user(&self, id: &UserId) -> Result<User, IngatinError>;

    /// Inserts a row and returns it with its server-assigned fields.
    async fn create_user(&self, user: &NewUser) -> Result<User, IngatinError>;

    /// Merges `patch` (plus a fresh `updated_at`) into the row with `id`.
    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User, IngatinError>;

    /// Removes the row with `id`.
    async fn delete_user(&self, id: &UserId) -> Result<(), IngatinError>;

    /// Clears one attendance flag on every row, refreshing `updated_at`.
    async fn reset_attendance(&self, shift: Shift) -> Result<(), IngatinError>;

    /// Clears `absen_pagi` on every row.
    async fn reset_morning_attendance(&self) -> Result<(), IngatinError> {
        self.reset_attendance(Shift::Morning).await
    }

    /// Clears `absen_sore` on every row.
    async fn reset_evening_attendance(&self) -> Result<(), IngatinError> {
        self.reset_attendance(Shift::Evening).await
    }
}
