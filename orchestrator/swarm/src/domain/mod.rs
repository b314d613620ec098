// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordination Domain Layer
//!
//! Pure value types for cross-agent coordination. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`lock`] | `ResourceKey`, `HolderId`, `LockLease` |
//! | [`session`] | `SessionId`, `AgentSession`, `SessionMerge` |
//! | [`notification`] | `Notification` |
//! | [`errors`] | `SyncError`, `TransportError` |

pub mod lock;
pub mod session;
pub mod notification;
pub mod errors;

pub use lock::*;
pub use session::*;
pub use notification::*;
pub use errors::*;
