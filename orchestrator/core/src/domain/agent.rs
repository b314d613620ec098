// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent
//!
//! The closed contract every action agent implements. Matching goes through
//! [`Agent::handles`]; the dispatcher never inspects concrete agent types.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Port for side-effecting action backends

use async_trait::async_trait;

use booner_swarm::ResourceKey;

use super::action::{ActionRequest, ExecutionError};
use super::capability::AgentCapability;
use super::intent::{ActionKind, Intent};

/// What a successful call produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentOutput {
    /// Identifier of the external resource the call created or changed.
    pub external_reference: Option<String>,
    pub data: serde_json::Value,
}

impl AgentOutput {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            external_reference: None,
            data,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.external_reference = Some(reference.into());
        self
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Declared capability. Its health field is ignored; the registry owns
    /// health.
    fn capability(&self) -> AgentCapability;

    fn handles(&self, kind: ActionKind) -> bool {
        self.capability().handles(kind)
    }

    /// The infrastructure target this intent would mutate, if any.
    ///
    /// `None` means no exclusive lock is needed (read-only actions).
    fn resource_key(&self, intent: &Intent) -> Option<ResourceKey>;

    /// Translate intent parameters into this agent's payload.
    fn build_payload(&self, intent: &Intent) -> Result<serde_json::Value, ExecutionError>;

    /// Perform one attempt.
    ///
    /// A failure that happens after something was mutated must carry the
    /// mutated resource's reference so it can be rolled back.
    async fn execute(&self, request: &ActionRequest) -> Result<AgentOutput, ExecutionError>;

    /// Undo the partial mutation identified by `external_reference`.
    async fn rollback(&self, request: &ActionRequest, external_reference: &str) -> Result<(), ExecutionError>;

    /// Lightweight reachability check used by the health monitor.
    async fn probe(&self) -> bool {
        true
    }
}
