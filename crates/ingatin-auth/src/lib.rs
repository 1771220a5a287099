// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication state for the Ingat-In dashboard: the session provider
//! that tracks whether a staff member is signed in, and the route guard
//! that redirects between the login and dashboard views.

pub mod guard;
pub mod session;

pub use guard::{AuthGuard, AuthState, Redirect};
pub use session::SessionManager;
