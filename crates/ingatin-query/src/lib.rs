// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side data layer of the Ingat-In dashboard.
//!
//! A keyed query cache with stale/fresh tracking and in-flight
//! deduplication, optimistic mutation transactions with rollback, and the
//! realtime bridge that invalidates cached queries when the `users` table
//! changes remotely.

pub mod bridge;
pub mod client;
pub mod key;
pub mod mutation;
pub mod transaction;
pub mod users;

pub use bridge::{
    InvalidationBinding, InvalidationSink, InvalidationTable, RealtimeBridge, RealtimeStatus,
    RealtimeSubscription, USERS_CHANNEL,
};
pub use client::{QueryClient, QueryObserver, QueryOptions, QueryState, StaleTime};
pub use key::{QueryKey, user_keys};
pub use mutation::run_mutation;
pub use transaction::OptimisticTransaction;
pub use users::{UserMutations, UserQueries};
