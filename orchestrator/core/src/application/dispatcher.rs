// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent Registry & Dispatcher
//!
//! Matches an intent to a registered capability, takes the per-resource
//! coordination lock, and hands the work to the executor.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Capability registration, health state machine, tie-break,
//!   and lock-guarded dispatch
//!
//! ## Health
//!
//! ```text
//! Healthy --N consecutive fatal results--> Degraded --unhealthy_after without a good probe--> Unhealthy
//!    ^                                        |                                                   |
//!    +------------ success / good probe ------+---------------- good probe -----------------------+
//! ```
//!
//! Matching prefers Healthy capabilities, falls back to Degraded ones, and
//! never selects Unhealthy ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use booner_swarm::{CoordinationClient, HolderId, LeaseGuard, ResourceKey, SyncError};

use crate::domain::action::{ActionOutcome, ActionRequest, ActionResult, DispatchError};
use crate::domain::agent::Agent;
use crate::domain::capability::{AgentCapability, CapabilityId, HealthStatus, RegistryError};
use crate::domain::config::TieBreak;
use crate::domain::events::OrchestrationEvent;
use crate::domain::intent::{ActionKind, Intent};
use crate::infrastructure::event_bus::EventBus;

use super::executor::ActionExecutor;

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub tie_break: TieBreak,
    pub failure_threshold: u32,
    pub unhealthy_after: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::MostRecentSuccess,
            failure_threshold: 3,
            unhealthy_after: Duration::from_secs(120),
        }
    }
}

struct Registration {
    agent: Arc<dyn Agent>,
    capability: AgentCapability,
    seq: u64,
    consecutive_failures: u32,
    last_success: Option<Instant>,
    degraded_since: Option<Instant>,
}

impl Registration {
    fn transition(&mut self, to: HealthStatus) -> Option<(HealthStatus, HealthStatus)> {
        let from = self.capability.health;
        if from == to {
            return None;
        }
        self.capability.health = to;
        self.degraded_since = (to == HealthStatus::Degraded).then(Instant::now);
        Some((from, to))
    }
}

pub struct AgentRegistry {
    entries: RwLock<Vec<Registration>>,
    next_seq: AtomicU64,
    settings: RegistrySettings,
    events: EventBus,
}

impl AgentRegistry {
    pub fn new(settings: RegistrySettings, events: EventBus) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            settings,
            events,
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Register an agent under its declared capability. Starts Healthy.
    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<CapabilityId, RegistryError> {
        let mut capability = agent.capability();
        capability.health = HealthStatus::Healthy;
        let id = capability.capability_id.clone();

        if capability.action_kinds.is_empty() {
            return Err(RegistryError::NoActionKinds(id));
        }

        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.capability.capability_id == id) {
            return Err(RegistryError::DuplicateCapability(id));
        }

        info!(
            capability_id = %id,
            target_host = %capability.target_host.host,
            action_kinds = ?capability.action_kinds,
            "Registered capability"
        );
        entries.push(Registration {
            agent,
            capability,
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            consecutive_failures: 0,
            last_success: None,
            degraded_since: None,
        });
        Ok(id)
    }

    pub fn deregister(&self, capability_id: &CapabilityId) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let position = entries
            .iter()
            .position(|e| &e.capability.capability_id == capability_id)
            .ok_or_else(|| RegistryError::UnknownCapability(capability_id.clone()))?;
        entries.remove(position);
        info!(capability_id = %capability_id, "Deregistered capability");
        Ok(())
    }

    /// All capabilities in registration order.
    pub fn capabilities(&self) -> Vec<AgentCapability> {
        self.entries.read().iter().map(|e| e.capability.clone()).collect()
    }

    pub fn capability(&self, capability_id: &CapabilityId) -> Option<AgentCapability> {
        self.entries
            .read()
            .iter()
            .find(|e| &e.capability.capability_id == capability_id)
            .map(|e| e.capability.clone())
    }

    pub fn agents(&self) -> Vec<(CapabilityId, Arc<dyn Agent>)> {
        self.entries
            .read()
            .iter()
            .map(|e| (e.capability.capability_id.clone(), Arc::clone(&e.agent)))
            .collect()
    }

    /// Best agent for `kind`, or `None` if nothing usable handles it.
    pub fn select(&self, kind: ActionKind) -> Option<(Arc<dyn Agent>, AgentCapability)> {
        if kind == ActionKind::Unknown {
            return None;
        }

        let entries = self.entries.read();
        let candidates: Vec<&Registration> = entries
            .iter()
            .filter(|e| e.capability.health != HealthStatus::Unhealthy && e.agent.handles(kind))
            .collect();

        let pool: Vec<&Registration> = if candidates.iter().any(|e| e.capability.health == HealthStatus::Healthy) {
            candidates
                .into_iter()
                .filter(|e| e.capability.health == HealthStatus::Healthy)
                .collect()
        } else {
            candidates
        };

        let best = match self.settings.tie_break {
            TieBreak::MostRecentSuccess => pool.into_iter().min_by(|a, b| {
                // Most recent first; never-succeeded last; then registration order.
                b.last_success.cmp(&a.last_success).then(a.seq.cmp(&b.seq))
            }),
            TieBreak::RegistrationOrder => pool.into_iter().min_by_key(|e| e.seq),
        }?;

        Some((Arc::clone(&best.agent), best.capability.clone()))
    }

    /// Fold a terminal dispatch result into the capability's health.
    pub fn record_result(&self, capability_id: &CapabilityId, result: &ActionResult) {
        let change = {
            let mut entries = self.entries.write();
            let Some(entry) = entries.iter_mut().find(|e| &e.capability.capability_id == capability_id) else {
                return;
            };

            match result.outcome {
                ActionOutcome::Success => {
                    entry.consecutive_failures = 0;
                    entry.last_success = Some(Instant::now());
                    entry.transition(HealthStatus::Healthy)
                }
                ActionOutcome::FatalFailure | ActionOutcome::RetryableFailure => {
                    entry.consecutive_failures += 1;
                    if entry.consecutive_failures >= self.settings.failure_threshold
                        && entry.capability.health == HealthStatus::Healthy
                    {
                        entry.transition(HealthStatus::Degraded)
                    } else {
                        None
                    }
                }
            }
        };
        self.announce(capability_id, change);
    }

    /// Fold a health probe into the capability's health.
    pub fn record_probe(&self, capability_id: &CapabilityId, healthy: bool) {
        let change = {
            let mut entries = self.entries.write();
            let Some(entry) = entries.iter_mut().find(|e| &e.capability.capability_id == capability_id) else {
                return;
            };

            if healthy {
                entry.consecutive_failures = 0;
                entry.transition(HealthStatus::Healthy)
            } else {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.settings.failure_threshold
                    && entry.capability.health == HealthStatus::Healthy
                {
                    entry.transition(HealthStatus::Degraded)
                } else {
                    None
                }
            }
        };
        self.announce(capability_id, change);
    }

    /// Move capabilities that stayed Degraded for `unhealthy_after` to
    /// Unhealthy. Returns how many were moved.
    pub fn promote_stale(&self) -> usize {
        let now = Instant::now();
        let changes: Vec<(CapabilityId, (HealthStatus, HealthStatus))> = {
            let mut entries = self.entries.write();
            entries
                .iter_mut()
                .filter(|e| {
                    e.capability.health == HealthStatus::Degraded
                        && e.degraded_since
                            .is_some_and(|since| now.duration_since(since) >= self.settings.unhealthy_after)
                })
                .filter_map(|e| {
                    let id = e.capability.capability_id.clone();
                    e.transition(HealthStatus::Unhealthy).map(|c| (id, c))
                })
                .collect()
        };

        let count = changes.len();
        for (id, change) in changes {
            self.announce(&id, Some(change));
        }
        count
    }

    fn announce(&self, capability_id: &CapabilityId, change: Option<(HealthStatus, HealthStatus)>) {
        let Some((from, to)) = change else {
            return;
        };
        match to {
            HealthStatus::Healthy => info!(capability_id = %capability_id, %from, %to, "Capability health changed"),
            _ => warn!(capability_id = %capability_id, %from, %to, "Capability health changed"),
        }
        self.events.publish(OrchestrationEvent::CapabilityHealthChanged {
            capability_id: capability_id.clone(),
            from,
            to,
            changed_at: Utc::now(),
        });
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Lock holder prefix, usually the node id.
    pub node_id: String,
    pub lock_ttl: Duration,
    /// Give up on a busy resource after this long.
    pub lock_wait: Duration,
    pub lock_poll_interval: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            node_id: "booner".to_string(),
            lock_ttl: Duration::from_secs(30),
            lock_wait: Duration::from_secs(5),
            lock_poll_interval: Duration::from_millis(250),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    executor: Arc<ActionExecutor>,
    coordination: Arc<CoordinationClient>,
    events: EventBus,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<AgentRegistry>,
        executor: Arc<ActionExecutor>,
        coordination: Arc<CoordinationClient>,
        events: EventBus,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            executor,
            coordination,
            events,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Route `intent` to a capable agent and execute it under the resource
    /// lock.
    ///
    /// Returns the intent's terminal result, or an error when nothing was
    /// attempted.
    pub async fn dispatch(&self, intent: &Intent) -> Result<ActionResult, DispatchError> {
        let kind = intent.resolved_action_kind;
        let outcome = self.dispatch_inner(intent).await;

        let label = match &outcome {
            Ok(result) => result.outcome.as_str(),
            Err(DispatchError::NoCapableAgent { .. }) => "no_capable_agent",
            Err(DispatchError::ResourceBusy { .. }) => "resource_busy",
            Err(DispatchError::Coordination(_)) => "coordination_error",
        };
        metrics::counter!("booner_dispatch_total", "kind" => kind.as_str(), "outcome" => label).increment(1);
        outcome
    }

    async fn dispatch_inner(&self, intent: &Intent) -> Result<ActionResult, DispatchError> {
        let kind = intent.resolved_action_kind;
        let (agent, capability) = self.registry.select(kind).ok_or_else(|| {
            warn!(intent_id = %intent.id, action_kind = %kind, "No capable agent");
            DispatchError::NoCapableAgent { kind }
        })?;
        let capability_id = capability.capability_id.clone();

        let resource_key = agent.resource_key(intent);
        let payload = agent.build_payload(intent);
        let mut request = ActionRequest::new(
            intent.id,
            kind,
            capability_id.clone(),
            resource_key.clone(),
            serde_json::Value::Null,
        );

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!(intent_id = %intent.id, capability_id = %capability_id, error = %e, "Payload rejected");
                return Ok(self.executor.reject(&request, e.message()).await);
            }
        };
        request.payload = payload;

        let lease = match &resource_key {
            Some(key) => Some(self.acquire(key, &HolderId::for_work(&self.settings.node_id, intent.id)).await?),
            None => None,
        };

        info!(
            intent_id = %intent.id,
            capability_id = %capability_id,
            resource_key = ?resource_key.as_ref().map(ResourceKey::as_str),
            "Dispatching intent"
        );
        self.events.publish(OrchestrationEvent::DispatchStarted {
            intent_id: intent.id,
            capability_id: capability_id.clone(),
            resource_key: resource_key.as_ref().map(|k| k.to_string()),
            started_at: Utc::now(),
        });

        let lease_lost = lease.as_ref().map(LeaseGuard::lost_signal).unwrap_or_default();
        let execution = self.executor.execute_guarded(agent.as_ref(), &request, &lease_lost).await;

        if let Some(lease) = lease {
            if lease.is_lost() {
                warn!(
                    intent_id = %intent.id,
                    resource_key = %lease.lease().resource_key,
                    "Lease was lost while the action ran"
                );
            }
            if let Err(e) = lease.release().await {
                warn!(intent_id = %intent.id, error = %e, "Failed to release resource lock");
            }
        }

        // A replayed result says nothing new about the capability.
        if !execution.replayed {
            self.registry.record_result(&capability_id, &execution.result);
        }
        Ok(execution.result)
    }

    /// Poll for the lease until `lock_wait` elapses. Fails closed when the
    /// coordination server cannot be reached.
    async fn acquire(&self, key: &ResourceKey, holder: &HolderId) -> Result<LeaseGuard, DispatchError> {
        let deadline = Instant::now() + self.settings.lock_wait;

        loop {
            match self.coordination.acquire_lease(key, holder, self.settings.lock_ttl).await {
                Ok(Some(lease)) => {
                    debug!(resource_key = %key, holder = %holder, "Acquired resource lock");
                    return Ok(lease);
                }
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        info!(resource_key = %key, "Resource busy");
                        return Err(DispatchError::ResourceBusy {
                            resource_key: key.clone(),
                        });
                    }
                    let wait = self.settings.lock_poll_interval.min(deadline - now);
                    tokio::time::sleep(wait).await;
                }
                Err(e @ SyncError::Unreachable { .. }) => {
                    warn!(resource_key = %key, error = %e, "Coordination unreachable; treating resource as busy");
                    return Err(DispatchError::ResourceBusy {
                        resource_key: key.clone(),
                    });
                }
                Err(e) => return Err(DispatchError::Coordination(e)),
            }
        }
    }
}
