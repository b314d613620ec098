// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordination Application Layer
//!
//! [`CoordinationTransport`] is the port to the coordination server's wire
//! contract. [`CoordinationClient`] wraps any transport with bounded retries,
//! a local session cache and fail-closed connectivity tracking.

mod client;
mod lease;
mod retry;

pub use client::{CoordinationClient, CoordinationSettings};
pub use lease::LeaseGuard;
pub use retry::RetryPolicy;

use crate::domain::{AgentSession, HolderId, Notification, ResourceKey, SessionId, TransportError};
use async_trait::async_trait;
use std::time::Duration;

/// Result of a conditional session write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// The server holds a different epoch than the caller expected.
    Conflict { remote_epoch: u64 },
}

/// Wire contract of the coordination server.
///
/// Lock messages are keyed by resource key and carry holder identity and TTL;
/// session messages carry an epoch and an opaque state blob.
#[async_trait]
pub trait CoordinationTransport: Send + Sync {
    /// Grant the lease if the key is free, expired, or already held by `holder`.
    async fn acquire(&self, key: &ResourceKey, holder: &HolderId, ttl: Duration) -> Result<bool, TransportError>;

    /// Extend a lease still held by `holder`. `false` means the lease was lost.
    async fn renew(&self, key: &ResourceKey, holder: &HolderId, ttl: Duration) -> Result<bool, TransportError>;

    /// Release the lease if held by `holder`; a no-op otherwise.
    async fn release(&self, key: &ResourceKey, holder: &HolderId) -> Result<(), TransportError>;

    async fn fetch_session(&self, session_id: &SessionId) -> Result<Option<AgentSession>, TransportError>;

    /// Store `session` only if the server currently holds `expected_epoch`.
    async fn store_session(&self, session: &AgentSession, expected_epoch: u64) -> Result<StoreOutcome, TransportError>;

    async fn notify(&self, notification: &Notification) -> Result<(), TransportError>;
}
