//! SPDX-License-Identifier: MIT

//! Configuration and logging for the client.

/// Configuration knobs for [`crate::client::Client`].
pub mod config;
/// `tracing` subscriber setup for downstream binaries and integration tests.
pub mod logger;
