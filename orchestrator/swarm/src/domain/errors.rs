// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

/// Errors surfaced by the coordination client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// The coordination server did not answer after bounded retries.
    #[error("coordination server unreachable after {attempts} attempts: {last_error}")]
    Unreachable { attempts: u32, last_error: String },

    /// The local copy is ahead of the server. Never resolved automatically.
    #[error("epoch conflict on session '{session_id}': local epoch {local_epoch} is ahead of remote epoch {remote_epoch}")]
    EpochConflict {
        session_id: String,
        local_epoch: u64,
        remote_epoch: u64,
    },

    /// The server answered but rejected the request.
    #[error("coordination protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Network-class errors that a caller may retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Unreachable { .. })
    }
}

/// Errors reported by a [`crate::application::CoordinationTransport`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, timeout, 5xx. Retried with backoff.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// The server understood and refused (4xx, undecodable body). Not retried.
    #[error("request rejected: {0}")]
    Rejected(String),
}
