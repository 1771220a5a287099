// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Ingat-In integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a hosted backend.
//!
//! # Components
//!
//! - [`MemoryUserStore`] - In-memory `users` table with failure injection
//! - [`MockChangeFeed`] - Change feed fed by the memory store
//! - [`MockAuth`] - Auth service with a single staff account
//! - [`TestHarness`] - The data layer assembled over the mocks

pub mod harness;
pub mod memory_store;
pub mod mock_auth;
pub mod mock_feed;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_store::MemoryUserStore;
pub use mock_auth::{MockAuth, TEST_EMAIL, TEST_PASSWORD, test_session};
pub use mock_feed::MockChangeFeed;
