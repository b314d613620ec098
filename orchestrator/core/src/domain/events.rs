// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::{ActionOutcome, RollbackStatus};
use super::capability::{CapabilityId, HealthStatus};
use super::intent::{ActionKind, IntentId};

/// Events emitted while a request moves through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    IntentInterpreted {
        intent_id: IntentId,
        action_kind: ActionKind,
        confidence: f32,
        interpreted_at: DateTime<Utc>,
    },
    ClarificationRequested {
        intent_id: IntentId,
        raw_text: String,
        reason: String,
        requested_at: DateTime<Utc>,
    },
    DispatchStarted {
        intent_id: IntentId,
        capability_id: CapabilityId,
        resource_key: Option<String>,
        started_at: DateTime<Utc>,
    },
    ActionAttempted {
        intent_id: IntentId,
        capability_id: CapabilityId,
        attempt: u32,
        outcome: ActionOutcome,
        attempted_at: DateTime<Utc>,
    },
    ActionCompleted {
        intent_id: IntentId,
        capability_id: CapabilityId,
        outcome: ActionOutcome,
        external_reference: Option<String>,
        rollback: Option<RollbackStatus>,
        completed_at: DateTime<Utc>,
    },
    CapabilityHealthChanged {
        capability_id: CapabilityId,
        from: HealthStatus,
        to: HealthStatus,
        changed_at: DateTime<Utc>,
    },
}

impl OrchestrationEvent {
    /// Intent this event belongs to, if any.
    pub fn intent_id(&self) -> Option<IntentId> {
        match self {
            OrchestrationEvent::IntentInterpreted { intent_id, .. }
            | OrchestrationEvent::ClarificationRequested { intent_id, .. }
            | OrchestrationEvent::DispatchStarted { intent_id, .. }
            | OrchestrationEvent::ActionAttempted { intent_id, .. }
            | OrchestrationEvent::ActionCompleted { intent_id, .. } => Some(*intent_id),
            OrchestrationEvent::CapabilityHealthChanged { .. } => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            OrchestrationEvent::IntentInterpreted { .. } => "intent_interpreted",
            OrchestrationEvent::ClarificationRequested { .. } => "clarification_requested",
            OrchestrationEvent::DispatchStarted { .. } => "dispatch_started",
            OrchestrationEvent::ActionAttempted { .. } => "action_attempted",
            OrchestrationEvent::ActionCompleted { .. } => "action_completed",
            OrchestrationEvent::CapabilityHealthChanged { .. } => "capability_health_changed",
        }
    }
}
