// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `booner-swarm`: Coordination Client Crate
//!
//! Keeps agent processes on one or many machines consistent with each other by
//! talking to an external coordination server.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `ResourceKey`, `HolderId`, `LockLease`, `AgentSession`, `SyncError` |
//! | [`application`] | Application | `CoordinationTransport` port, `CoordinationClient`, `LeaseGuard`, `RetryPolicy` |
//! | [`infrastructure`] | Infrastructure | `InMemoryCoordinationServer`, `HttpCoordinationTransport` |
//!
//! ## Key Concepts
//!
//! - **Leased lock**: at most one holder per resource key; a lease that is not
//!   renewed before its TTL elapses becomes acquirable by anyone else.
//! - **Session epoch**: every stored session version carries a monotonically
//!   increasing epoch; a local copy that is *ahead* of the server is a conflict
//!   and is reported, never merged.
//! - **Fail closed**: when the server is unreachable after bounded retries, lock
//!   acquisition reports `SyncError::Unreachable` so callers treat the resource
//!   as unavailable.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::{CoordinationClient, CoordinationSettings, CoordinationTransport, LeaseGuard, RetryPolicy};
pub use infrastructure::{HttpCoordinationTransport, InMemoryCoordinationServer};
