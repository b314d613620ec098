// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Sessions
//!
//! An [`AgentSession`] is the shared, server-resident state of one
//! conversation with the orchestrator. The state itself is an opaque JSON blob;
//! only the `epoch` is interpreted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Versioned session state.
///
/// # Invariants
///
/// - `epoch` only grows; each stored mutation increments it by exactly one.
/// - A session that was never stored has epoch `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSession {
    pub session_id: SessionId,
    pub epoch: u64,
    #[serde(default)]
    pub state: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl AgentSession {
    /// An empty, never-stored session.
    pub fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            epoch: 0,
            state: serde_json::Value::Object(Default::default()),
            updated_at: Utc::now(),
        }
    }

    /// The next version of this session carrying `state`.
    pub fn next(&self, state: serde_json::Value) -> Self {
        Self {
            session_id: self.session_id.clone(),
            epoch: self.epoch + 1,
            state,
            updated_at: Utc::now(),
        }
    }
}

/// What a session sync did to the local copy.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMerge {
    /// Local copy was behind and has been replaced by the remote version.
    Overwritten(AgentSession),
    /// Local and remote agree on the epoch.
    InSync(AgentSession),
}

impl SessionMerge {
    pub fn into_session(self) -> AgentSession {
        match self {
            SessionMerge::Overwritten(session) | SessionMerge::InSync(session) => session,
        }
    }
}

/// Merge a locally cached session with the remote one.
///
/// A missing remote session counts as epoch `0`; a missing local copy counts as
/// epoch `0` too. A local epoch ahead of the remote one is never resolved here.
pub fn merge_sessions(
    session_id: &SessionId,
    local: Option<&AgentSession>,
    remote: Option<AgentSession>,
) -> Result<SessionMerge, SyncError> {
    let local_epoch = local.map(|s| s.epoch).unwrap_or(0);
    let remote_epoch = remote.as_ref().map(|s| s.epoch).unwrap_or(0);

    if local_epoch > remote_epoch {
        return Err(SyncError::EpochConflict {
            session_id: session_id.to_string(),
            local_epoch,
            remote_epoch,
        });
    }

    match (local, remote) {
        (_, Some(remote)) if local_epoch < remote_epoch => Ok(SessionMerge::Overwritten(remote)),
        (_, Some(remote)) => Ok(SessionMerge::InSync(remote)),
        (Some(local), None) => Ok(SessionMerge::InSync(local.clone())),
        (None, None) => Ok(SessionMerge::InSync(AgentSession::empty(session_id.clone()))),
    }
}
