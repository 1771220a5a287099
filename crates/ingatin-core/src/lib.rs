// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ingat-In attendance dashboard.
//!
//! Defines the domain types of the `users` table, the adapter traits that
//! abstract the hosted backend (row store, auth service, change feed), the
//! shared error type, and small pure helpers (WhatsApp number handling,
//! attendance statistics, Indonesian date formatting).

pub mod error;
pub mod format;
pub mod stats;
pub mod traits;
pub mod types;
pub mod whatsapp;

pub use error::IngatinError;
pub use stats::{AttendanceStats, CategoryStats};
pub use types::{
    AdapterType, AuthEvent, AuthEventKind, AuthIdentity, ChangeEvent, ChangeKind, ChannelMessage,
    ChannelSpec, EventFilter, HealthStatus, NewUser, Session, Shift, SubscriptionStatus, User,
    UserId, UserPatch,
};

pub use traits::{AuthProvider, ChangeFeed, ChannelHandle, PluginAdapter, UserStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_user_store<T: UserStore>() {}
        fn _assert_auth_provider<T: AuthProvider>() {}
        fn _assert_change_feed<T: ChangeFeed>() {}
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [AdapterType::Store, AdapterType::Auth, AdapterType::Realtime] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }
}
