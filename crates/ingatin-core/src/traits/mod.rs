// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the hosted backend boundary.
//!
//! The dashboard treats the backend as three collaborators: a row store,
//! an auth service, and a change-notification feed. Each is a trait so the
//! query layer and the views can run against in-memory doubles in tests.

pub mod adapter;
pub mod auth;
pub mod realtime;
pub mod store;

pub use adapter::PluginAdapter;
pub use auth::AuthProvider;
pub use realtime::{ChangeFeed, ChannelHandle};
pub use store::UserStore;
