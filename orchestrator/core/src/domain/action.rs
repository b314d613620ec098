// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Action
//!
//! One attempt at a side-effecting call on behalf of an intent, and its
//! classified outcome.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** `ActionRequest` / `ActionResult` pairs, outcome
//!   classification, and the dispatch/execution error taxonomy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use booner_swarm::{ResourceKey, SyncError};

use super::capability::CapabilityId;
use super::intent::{ActionKind, IntentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    /// 5xx, timeout, connection refused. Re-attempted up to the cap.
    RetryableFailure,
    /// Invalid credentials, rejected payload, or the retry cap was exceeded.
    FatalFailure,
}

impl ActionOutcome {
    /// Whether no further attempt will be made for this intent.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionOutcome::RetryableFailure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Success => "success",
            ActionOutcome::RetryableFailure => "retryable_failure",
            ActionOutcome::FatalFailure => "fatal_failure",
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the compensating call after a fatal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum RollbackStatus {
    /// Nothing was mutated, so there was nothing to undo.
    NotNeeded,
    Succeeded,
    Failed(String),
}

/// The executor's input for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub intent_id: IntentId,
    pub action_kind: ActionKind,
    pub capability_id: CapabilityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_key: Option<ResourceKey>,
    /// Opaque, agent-specific body.
    pub payload: serde_json::Value,
    /// 1-based.
    pub attempt_count: u32,
    /// External resource created by an earlier attempt for the same intent.
    /// Agents use it to resume instead of creating a second resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_reference: Option<String>,
}

impl ActionRequest {
    pub fn new(
        intent_id: IntentId,
        action_kind: ActionKind,
        capability_id: CapabilityId,
        resource_key: Option<ResourceKey>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            intent_id,
            action_kind,
            capability_id,
            resource_key,
            payload,
            attempt_count: 1,
            prior_reference: None,
        }
    }

    pub(crate) fn for_attempt(&self, attempt_count: u32, prior_reference: Option<String>) -> Self {
        Self {
            attempt_count,
            prior_reference,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub intent_id: IntentId,
    pub capability_id: CapabilityId,
    pub attempt_count: u32,
    pub outcome: ActionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    /// Agent output on success, error message otherwise.
    pub detail: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackStatus>,
    pub completed_at: DateTime<Utc>,
}

impl ActionResult {
    pub fn success(request: &ActionRequest, external_reference: Option<String>, detail: serde_json::Value) -> Self {
        Self::from_request(request, ActionOutcome::Success, external_reference, detail)
    }

    pub fn retryable(request: &ActionRequest, external_reference: Option<String>, message: impl Into<String>) -> Self {
        Self::from_request(
            request,
            ActionOutcome::RetryableFailure,
            external_reference,
            serde_json::Value::String(message.into()),
        )
    }

    pub fn fatal(request: &ActionRequest, external_reference: Option<String>, message: impl Into<String>) -> Self {
        Self::from_request(
            request,
            ActionOutcome::FatalFailure,
            external_reference,
            serde_json::Value::String(message.into()),
        )
    }

    fn from_request(
        request: &ActionRequest,
        outcome: ActionOutcome,
        external_reference: Option<String>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            intent_id: request.intent_id,
            capability_id: request.capability_id.clone(),
            attempt_count: request.attempt_count,
            outcome,
            external_reference,
            detail,
            rollback: None,
            completed_at: Utc::now(),
        }
    }

    pub fn with_rollback(mut self, status: RollbackStatus) -> Self {
        self.rollback = Some(status);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ActionOutcome::Success
    }

    /// Error text for failed results.
    pub fn message(&self) -> Option<&str> {
        match self.outcome {
            ActionOutcome::Success => None,
            _ => self.detail.as_str(),
        }
    }
}

/// Failure reported by an agent for a single call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("retryable failure: {message}")]
    RetryableFailure {
        message: String,
        /// Set when the call mutated something before failing.
        external_reference: Option<String>,
    },

    #[error("fatal failure: {message}")]
    FatalFailure {
        message: String,
        external_reference: Option<String>,
    },

    #[error("rollback of '{external_reference}' failed: {message}")]
    RollbackFailure {
        external_reference: String,
        message: String,
    },
}

impl ExecutionError {
    pub fn retryable(message: impl Into<String>) -> Self {
        ExecutionError::RetryableFailure {
            message: message.into(),
            external_reference: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        ExecutionError::FatalFailure {
            message: message.into(),
            external_reference: None,
        }
    }

    /// Attach the reference of something already mutated.
    pub fn with_reference(self, reference: impl Into<String>) -> Self {
        let reference = Some(reference.into());
        match self {
            ExecutionError::RetryableFailure { message, .. } => ExecutionError::RetryableFailure {
                message,
                external_reference: reference,
            },
            ExecutionError::FatalFailure { message, .. } => ExecutionError::FatalFailure {
                message,
                external_reference: reference,
            },
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecutionError::RetryableFailure { .. })
    }

    pub fn external_reference(&self) -> Option<&str> {
        match self {
            ExecutionError::RetryableFailure { external_reference, .. }
            | ExecutionError::FatalFailure { external_reference, .. } => external_reference.as_deref(),
            ExecutionError::RollbackFailure { external_reference, .. } => Some(external_reference),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ExecutionError::RetryableFailure { message, .. }
            | ExecutionError::FatalFailure { message, .. }
            | ExecutionError::RollbackFailure { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("no capable agent for action kind '{kind}'")]
    NoCapableAgent { kind: ActionKind },

    /// Another request holds the lock on this resource. Retryable.
    #[error("resource '{resource_key}' is busy")]
    ResourceBusy { resource_key: ResourceKey },

    #[error(transparent)]
    Coordination(#[from] SyncError),
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::ResourceBusy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ActionRequest {
        ActionRequest::new(
            IntentId::new(),
            ActionKind::GameServerDeploy,
            CapabilityId::new("games"),
            Some(ResourceKey::new("game:alpha:25565")),
            json!({"game_type": "minecraft"}),
        )
    }

    #[test]
    fn test_only_retryable_outcome_is_not_terminal() {
        assert!(ActionOutcome::Success.is_terminal());
        assert!(ActionOutcome::FatalFailure.is_terminal());
        assert!(!ActionOutcome::RetryableFailure.is_terminal());
    }

    #[test]
    fn test_result_copies_request_identity() {
        let req = request().for_attempt(3, Some("mc-instance-7".into()));
        let result = ActionResult::fatal(&req, req.prior_reference.clone(), "firewall rejected rule");

        assert_eq!(result.intent_id, req.intent_id);
        assert_eq!(result.attempt_count, 3);
        assert_eq!(result.external_reference.as_deref(), Some("mc-instance-7"));
        assert_eq!(result.message(), Some("firewall rejected rule"));
        assert!(result.rollback.is_none());
    }

    #[test]
    fn test_with_reference_keeps_class() {
        let err = ExecutionError::fatal("bad payload").with_reference("abc");
        assert!(!err.is_retryable());
        assert_eq!(err.external_reference(), Some("abc"));

        let err = ExecutionError::retryable("503").with_reference("abc");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_no_capable_agent_message() {
        let err = DispatchError::NoCapableAgent {
            kind: ActionKind::GameServerDeploy,
        };
        assert_eq!(err.to_string(), "no capable agent for action kind 'game_server_deploy'");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rollback_status_serialization() {
        let value = serde_json::to_value(RollbackStatus::Failed("timeout".into())).unwrap();
        assert_eq!(value, json!({"status": "failed", "message": "timeout"}));
    }
}
